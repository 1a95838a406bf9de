//! Annotations for uncovered lines that a change added.
//!
//! Coverage paths are normalized to repo-relative form and matched against
//! the diff, so only lines inside added hunks are flagged.

use crate::diff::{FileDiff, LineRange};
use crate::model::{Annotation, Report};
use crate::paths::{normalize_path_for_annotation, paths_match};

/// Build one annotation per run of consecutive uncovered added lines.
#[must_use]
pub fn annotations(report: &Report, diffs: &[FileDiff]) -> Vec<Annotation> {
    let mut out = Vec::new();

    for file in &report.files {
        if file.uncovered_lines.is_empty() {
            continue;
        }
        let normalized = normalize_path_for_annotation(&file.path);
        let Some(diff) = diffs
            .iter()
            .find(|d| d.path == normalized)
            .or_else(|| diffs.iter().find(|d| paths_match(&d.path, &file.path)))
        else {
            continue;
        };

        let added: Vec<u32> = file
            .uncovered_lines
            .iter()
            .copied()
            .filter(|&line| diff.contains(line))
            .collect();

        for range in group_consecutive_lines(&added) {
            out.push(Annotation {
                path: diff.path.clone(),
                start_line: range.start,
                end_line: range.end,
                message: uncovered_message(range),
            });
        }
    }

    out
}

/// Sort, dedup and coalesce line numbers into inclusive ranges.
#[must_use]
pub fn group_consecutive_lines(lines: &[u32]) -> Vec<LineRange> {
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<LineRange> = Vec::new();
    for line in sorted {
        match ranges.last_mut() {
            Some(last) if last.end + 1 == line => last.end = line,
            _ => ranges.push(LineRange {
                start: line,
                end: line,
            }),
        }
    }
    ranges
}

fn uncovered_message(range: LineRange) -> String {
    if range.start == range.end {
        format!("Line {} is not covered by tests", range.start)
    } else {
        format!(
            "Lines {}-{} are not covered by tests",
            range.start, range.end
        )
    }
}

/// Render an annotation as a GitHub Actions `::warning` workflow command.
#[must_use]
pub fn workflow_command(annotation: &Annotation) -> String {
    format!(
        "::warning file={},line={},endLine={},title=Uncovered code::{}",
        escape_property(&annotation.path),
        annotation.start_line,
        annotation.end_line,
        escape_data(&annotation.message)
    )
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}
