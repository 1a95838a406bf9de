//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `Report`; the comparison engine pairs
//! a head report with an optional base report.

/// Compute a coverage percentage (0-100), returning 0.0 when the total is zero.
#[must_use]
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Coverage facts for a single source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCoverage {
    /// Path as reported by the coverage tool.
    pub path: String,
    pub lines_covered: u64,
    pub lines_total: u64,
    /// Lines with a zero hit count, in the order the report listed them.
    pub uncovered_lines: Vec<u32>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.lines_covered, self.lines_total)
    }
}

/// The complete result of parsing a single coverage report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub files: Vec<FileCoverage>,
    pub total_covered: u64,
    pub total_lines: u64,
    pub coverage: f64,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from a file list and compute its totals.
    pub fn from_files(files: Vec<FileCoverage>) -> Self {
        let mut report = Self {
            files,
            ..Default::default()
        };
        report.calculate();
        report
    }

    /// Recompute totals from `files`. Safe to call repeatedly.
    pub fn calculate(&mut self) {
        self.total_covered = self.files.iter().map(|f| f.lines_covered).sum();
        self.total_lines = self.files.iter().map(|f| f.lines_total).sum();
        self.coverage = percentage(self.total_covered, self.total_lines);
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.total_covered
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.total_lines.saturating_sub(self.total_covered)
    }
}

/// Per-file delta between head and base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileChange {
    /// Version-control path when one was matched, else the coverage path.
    pub path: String,
    pub head_coverage: f64,
    pub base_coverage: f64,
    pub delta: f64,
    /// No counterpart in the base report.
    pub is_new: bool,
    /// Changed in version control but absent from the head report.
    pub no_coverage: bool,
}

/// A head report reconciled against an optional base report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub head: Option<Report>,
    pub base: Option<Report>,
    pub coverage_delta: f64,
    pub file_changes: Vec<FileChange>,
}

/// A single annotation to attach to a GitHub check run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Source file path relative to the repo root.
    pub path: String,
    /// Start line of the annotation range.
    pub start_line: u32,
    /// End line of the annotation range.
    pub end_line: u32,
    /// Annotation message.
    pub message: String,
}
