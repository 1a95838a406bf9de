//! Markdown rendering of a comparison for a pull-request comment.

use std::fmt::Write;

use crate::error::CovError;
use crate::model::{Comparison, FileChange, Report};

/// Hidden marker used to find (and update) our own comment on a PR.
pub const COMMENT_MARKER: &str = "<!-- prcov -->";

const DEFAULT_TITLE: &str = "Coverage Report";

/// Which files the "Impacted Files" table lists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShowFiles {
    All,
    /// Files changed in the PR (all files when no changed list is known).
    Changed,
    /// Files below the given coverage percentage.
    Threshold(f64),
    /// The N files with the lowest coverage.
    Worst(usize),
}

impl std::str::FromStr for ShowFiles {
    type Err = CovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || {
            CovError::Parse(format!(
                "Invalid show-files value: '{s}'. Expected all, changed, threshold:N or worst:N"
            ))
        };
        match s {
            "all" => Ok(ShowFiles::All),
            "changed" => Ok(ShowFiles::Changed),
            _ => {
                if let Some(n) = s.strip_prefix("threshold:") {
                    n.parse().map(ShowFiles::Threshold).map_err(|_| invalid())
                } else if let Some(n) = s.strip_prefix("worst:") {
                    n.parse().map(ShowFiles::Worst).map_err(|_| invalid())
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

/// Presentation options for [`format_comment`].
#[derive(Debug, Clone)]
pub struct CommentOptions {
    pub title: String,
    pub show_files: ShowFiles,
    /// e.g. `https://github.com/owner/repo`; file names link to blobs when
    /// both this and `sha` are set.
    pub repo_url: Option<String>,
    pub sha: Option<String>,
    pub pr_number: Option<u64>,
    pub base_branch: String,
}

impl Default for CommentOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            show_files: ShowFiles::Changed,
            repo_url: None,
            sha: None,
            pr_number: None,
            base_branch: "main".to_string(),
        }
    }
}

/// Render the full comment body. Returns an empty string when the
/// comparison has no head report.
#[must_use]
pub fn format_comment(comparison: &Comparison, opts: &CommentOptions) -> String {
    let Some(head) = comparison.head.as_ref() else {
        return String::new();
    };

    let mut md = String::new();
    md.push_str(COMMENT_MARKER);
    md.push('\n');

    let title = if opts.title.is_empty() {
        DEFAULT_TITLE
    } else {
        &opts.title
    };
    writeln!(md, "## {title}\n").unwrap();

    let delta = format_delta(comparison.coverage_delta, comparison.base.is_some());
    writeln!(
        md,
        "> {} **Coverage:** `{:.2}%`{} | **Lines:** `{}/{}` | **Files:** `{}`\n",
        status_emoji(head.coverage),
        head.coverage,
        delta,
        head.total_covered,
        head.total_lines,
        head.files.len()
    )
    .unwrap();

    write_coverage_diff(&mut md, head, comparison.base.as_ref(), opts);

    let files = select_files(&comparison.file_changes, opts.show_files);
    write_impacted_files(&mut md, &files, opts);

    md.push_str("---\n<sub>Generated by prcov</sub>\n");
    md
}

fn format_delta(delta: f64, has_base: bool) -> String {
    if !has_base || delta == 0.0 {
        String::new()
    } else if delta > 0.0 {
        format!(" (+{delta:.2}%)")
    } else {
        format!(" ({delta:.2}%)")
    }
}

/// `+` when the value improved, `-` when it regressed, blank otherwise.
fn trend_prefix(diff: i64, higher_is_better: bool) -> char {
    match (diff.signum(), higher_is_better) {
        (0, _) => ' ',
        (1, true) | (-1, false) => '+',
        _ => '-',
    }
}

fn write_coverage_diff(md: &mut String, head: &Report, base: Option<&Report>, opts: &CommentOptions) {
    md.push_str("<details>\n<summary>Coverage Diff</summary>\n\n```diff\n");

    let pr_ref = opts
        .pr_number
        .map_or_else(|| "HEAD".to_string(), |n| format!("#{n}"));
    md.push_str("@@              Coverage Diff              @@\n");
    writeln!(md, "##           {:>8}   {:>8}     +/-   ##", opts.base_branch, pr_ref).unwrap();
    md.push_str("=============================================\n");

    match base {
        Some(base) => {
            let diff = head.coverage - base.coverage;
            let prefix = if diff > 0.0 {
                '+'
            } else if diff < 0.0 {
                '-'
            } else {
                ' '
            };
            writeln!(
                md,
                "{prefix} Coverage     {:>6.2}%   {:>6.2}%   {diff:+.2}%",
                base.coverage, head.coverage
            )
            .unwrap();
            md.push_str("=============================================\n");

            let files_diff = head.files.len() as i64 - base.files.len() as i64;
            writeln!(
                md,
                "  Files           {:>4}      {:>4}   {files_diff:>+5}",
                base.files.len(),
                head.files.len()
            )
            .unwrap();
            let lines_diff = head.total_lines as i64 - base.total_lines as i64;
            writeln!(
                md,
                "  Lines          {:>5}     {:>5}   {lines_diff:>+5}",
                base.total_lines, head.total_lines
            )
            .unwrap();
            md.push_str("=============================================\n");

            let hits_diff = head.hits() as i64 - base.hits() as i64;
            writeln!(
                md,
                "{} Hits          {:>5}     {:>5}   {hits_diff:>+5}",
                trend_prefix(hits_diff, true),
                base.hits(),
                head.hits()
            )
            .unwrap();
            let misses_diff = head.misses() as i64 - base.misses() as i64;
            writeln!(
                md,
                "{} Misses        {:>5}     {:>5}   {misses_diff:>+5}",
                trend_prefix(misses_diff, false),
                base.misses(),
                head.misses()
            )
            .unwrap();
        }
        None => {
            writeln!(md, "  Coverage              {:>6.2}%", head.coverage).unwrap();
            md.push_str("=============================================\n");
            writeln!(md, "  Files                     {:>4}", head.files.len()).unwrap();
            writeln!(md, "  Lines                    {:>5}", head.total_lines).unwrap();
            md.push_str("=============================================\n");
            writeln!(md, "  Hits                     {:>5}", head.hits()).unwrap();
            writeln!(md, "  Misses                   {:>5}", head.misses()).unwrap();
        }
    }

    md.push_str("```\n\n</details>\n\n");
}

/// Apply the `ShowFiles` policy to the comparison's file changes.
#[must_use]
pub fn select_files(changes: &[FileChange], show: ShowFiles) -> Vec<&FileChange> {
    match show {
        ShowFiles::All | ShowFiles::Changed => changes.iter().collect(),
        ShowFiles::Threshold(limit) => changes
            .iter()
            .filter(|c| c.head_coverage < limit)
            .collect(),
        ShowFiles::Worst(n) => {
            let mut sorted: Vec<&FileChange> = changes.iter().collect();
            sorted.sort_by(|a, b| a.head_coverage.total_cmp(&b.head_coverage));
            sorted.truncate(n);
            sorted
        }
    }
}

fn write_impacted_files(md: &mut String, files: &[&FileChange], opts: &CommentOptions) {
    if files.is_empty() {
        return;
    }

    md.push_str("<details>\n");
    writeln!(md, "<summary>Impacted Files ({})</summary>\n", files.len()).unwrap();
    md.push_str("| File | Coverage | \u{0394} | Status |\n");
    md.push_str("|------|----------|---|--------|\n");

    for change in files {
        let status = if change.no_coverage {
            "\u{274C} no coverage"
        } else {
            status_emoji(change.head_coverage)
        };
        writeln!(
            md,
            "| {} | `{:.2}%` | {} | {} |",
            format_file_name(&change.path, opts),
            change.head_coverage,
            format_file_delta(change),
            status
        )
        .unwrap();
    }

    md.push_str("\n</details>\n\n");
}

fn format_file_delta(change: &FileChange) -> String {
    if change.is_new {
        "`new`".to_string()
    } else if change.delta == 0.0 {
        "`\u{00f8}`".to_string()
    } else if change.delta > 0.0 {
        format!("`+{:.2}%`", change.delta)
    } else {
        format!("`{:.2}%`", change.delta)
    }
}

fn format_file_name(path: &str, opts: &CommentOptions) -> String {
    match (&opts.repo_url, &opts.sha) {
        (Some(url), Some(sha)) => format!("[`{path}`]({url}/blob/{sha}/{path})"),
        _ => format!("`{path}`"),
    }
}

/// Pass / warn / fail marker for a coverage percentage.
#[must_use]
pub fn status_emoji(coverage: f64) -> &'static str {
    if coverage >= 80.0 {
        "\u{2705}"
    } else if coverage >= 50.0 {
        "\u{26A0}\u{FE0F}"
    } else {
        "\u{274C}"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::model::FileCoverage;

    fn file(path: &str, covered: u64, total: u64) -> FileCoverage {
        FileCoverage {
            path: path.to_string(),
            lines_covered: covered,
            lines_total: total,
            uncovered_lines: vec![],
        }
    }

    fn change(path: &str, head: f64) -> FileChange {
        FileChange {
            path: path.to_string(),
            head_coverage: head,
            delta: head,
            is_new: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_show_files_from_str() {
        assert_eq!("all".parse::<ShowFiles>().unwrap(), ShowFiles::All);
        assert_eq!("changed".parse::<ShowFiles>().unwrap(), ShowFiles::Changed);
        assert_eq!(
            "threshold:75.5".parse::<ShowFiles>().unwrap(),
            ShowFiles::Threshold(75.5)
        );
        assert_eq!("worst:3".parse::<ShowFiles>().unwrap(), ShowFiles::Worst(3));
        assert!("worst:x".parse::<ShowFiles>().is_err());
        assert!("some".parse::<ShowFiles>().is_err());
    }

    #[test]
    fn test_select_files() {
        let changes = vec![change("a.go", 90.0), change("b.go", 10.0), change("c.go", 50.0)];

        assert_eq!(select_files(&changes, ShowFiles::All).len(), 3);

        let below: Vec<&str> = select_files(&changes, ShowFiles::Threshold(60.0))
            .iter()
            .map(|c| c.path.as_str())
            .collect();
        assert_eq!(below, vec!["b.go", "c.go"]);

        let worst: Vec<&str> = select_files(&changes, ShowFiles::Worst(2))
            .iter()
            .map(|c| c.path.as_str())
            .collect();
        assert_eq!(worst, vec!["b.go", "c.go"]);

        assert_eq!(select_files(&changes, ShowFiles::Worst(10)).len(), 3);
    }

    #[test]
    fn test_status_emoji() {
        assert_eq!(status_emoji(80.0), "\u{2705}");
        assert_eq!(status_emoji(50.0), "\u{26A0}\u{FE0F}");
        assert_eq!(status_emoji(49.99), "\u{274C}");
    }

    #[test]
    fn test_format_comment_without_head() {
        let comparison = Comparison::default();
        assert_eq!(format_comment(&comparison, &CommentOptions::default()), "");
    }

    #[test]
    fn test_format_comment_without_base() {
        let head = Report::from_files(vec![file("cmd/main.go", 3, 4)]);
        let comparison = compare(Some(head), None, &[]);
        let body = format_comment(&comparison, &CommentOptions::default());

        assert!(body.starts_with(COMMENT_MARKER));
        assert!(body.contains("## Coverage Report"));
        assert!(body.contains("**Coverage:** `75.00%` | **Lines:** `3/4` | **Files:** `1`"));
        assert!(body.contains("Impacted Files (1)"));
        assert!(body.contains("| `cmd/main.go` | `75.00%` | `new` |"));
        assert!(body.contains("##               main       HEAD     +/-   ##"));
        assert!(!body.contains("(+"));
    }

    #[test]
    fn test_format_comment_with_base() {
        let head = Report::from_files(vec![file("a.go", 3, 4), file("b.go", 1, 1)]);
        let base = Report::from_files(vec![file("a.go", 1, 2), file("b.go", 1, 1)]);
        let comparison = compare(Some(head), Some(base), &[]);
        let opts = CommentOptions {
            title: "Go Coverage".to_string(),
            repo_url: Some("https://github.com/o/r".to_string()),
            sha: Some("abc123".to_string()),
            pr_number: Some(42),
            ..Default::default()
        };
        let body = format_comment(&comparison, &opts);

        assert!(body.contains("## Go Coverage"));
        // head 4/5 = 80%, base 2/3 = 66.67%
        assert!(body.contains("`80.00%` (+13.33%)"));
        assert!(body.contains("+ Coverage      66.67%    80.00%   +13.33%"));
        assert!(body.contains("#42"));
        assert!(body.contains("[`a.go`](https://github.com/o/r/blob/abc123/a.go)"));
        assert!(body.contains("`+25.00%`"));
        assert!(body.contains("`\u{00f8}`"));
        assert!(body.contains("+ Hits              2         4      +2"));
        assert!(body.contains("  Misses            1         1      +0"));
    }

    #[test]
    fn test_format_comment_no_coverage_row() {
        let head = Report::from_files(vec![file("a.go", 1, 1)]);
        let comparison = compare(Some(head), None, &["a.go".to_string(), "b.go".to_string()]);
        let body = format_comment(&comparison, &CommentOptions::default());
        assert!(body.contains("| `b.go` | `0.00%` | `new` | \u{274C} no coverage |"));
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(1.5, true), " (+1.50%)");
        assert_eq!(format_delta(-2.25, true), " (-2.25%)");
        assert_eq!(format_delta(0.0, true), "");
        assert_eq!(format_delta(5.0, false), "");
    }
}
