/// Parse a unified diff to extract which line ranges were added in each file.
/// Used to limit annotations to lines the change under review touched.
///
/// Also provides a [`DiffSource`] trait that abstracts over different
/// ways to obtain a diff (git, GitHub API).
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::github;

static DIFF_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^diff --git a/.+ b/(.+)$").unwrap());

static HUNK_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").unwrap());

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn fetch_diff(&self) -> Result<String>;
}

/// Diff from a git command (e.g., `git diff origin/main...HEAD`).
pub struct GitDiff {
    /// Arguments to pass to `git diff`.
    pub args: String,
}

impl DiffSource for GitDiff {
    fn fetch_diff(&self) -> Result<String> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }
}

/// Diff of a GitHub pull request.
pub struct GitHubDiff<'a> {
    pub context: &'a github::Context,
    pub pr_number: u64,
}

impl DiffSource for GitHubDiff<'_> {
    fn fetch_diff(&self) -> Result<String> {
        self.context.fetch_diff(self.pr_number)
    }
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// An inclusive range of line numbers in the new version of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    #[must_use]
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Added line ranges for one file of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub added_lines: Vec<LineRange>,
}

impl FileDiff {
    #[must_use]
    pub fn contains(&self, line: u32) -> bool {
        self.added_lines.iter().any(|r| r.contains(line))
    }
}

/// Parse a unified diff (`git diff` or the GitHub diff media type) into
/// per-file added line ranges, in diff order.
///
/// Each hunk contributes the whole new-side range from its header. Binary
/// files, pure deletions and files without any added range are omitted.
pub fn parse_unified_diff(diff_text: &str) -> Vec<FileDiff> {
    let mut result = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut is_binary = false;

    for line in diff_text.lines() {
        if let Some(caps) = DIFF_HEADER_RE.captures(line) {
            result.extend(current.take().filter(|f| !f.added_lines.is_empty()));
            current = Some(FileDiff {
                path: caps[1].to_string(),
                added_lines: Vec::new(),
            });
            is_binary = false;
            continue;
        }

        if line.starts_with("Binary files") {
            is_binary = true;
            continue;
        }
        if is_binary {
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };
        if let Some(range) = parse_hunk_header(line) {
            file.added_lines.push(range);
        }
    }

    result.extend(current.filter(|f| !f.added_lines.is_empty()));
    result
}

/// New-side range from a hunk header like "@@ -10,5 +20,8 @@".
/// A missing count means one line; a zero count yields no range.
fn parse_hunk_header(line: &str) -> Option<LineRange> {
    let caps = HUNK_HEADER_RE.captures(line)?;
    let start = caps[1].parse::<u32>().ok()?;
    let count = match caps.get(2) {
        Some(m) => m.as_str().parse::<u32>().ok()?,
        None => 1,
    };
    if count == 0 {
        return None;
    }
    Some(LineRange {
        start,
        end: start.checked_add(count - 1)?,
    })
}
