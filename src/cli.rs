//! Command helpers for the prcov binary.
//!
//! Each helper returns its output as a `String` (or writes to a given path),
//! so it can be tested without capturing stdout.

use std::fmt::Write;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::annotate;
use crate::detect::Format;
use crate::diff::{self, DiffSource};
use crate::ingest;
use crate::model::{Comparison, Report};

/// Coverage format selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Auto,
    Lcov,
    Cobertura,
    Xml,
}

impl FormatArg {
    /// `None` means auto-detect.
    pub fn format(self) -> Option<Format> {
        match self {
            FormatArg::Auto => None,
            FormatArg::Lcov => Some(Format::Lcov),
            FormatArg::Cobertura | FormatArg::Xml => Some(Format::Cobertura),
        }
    }
}

/// Load the head report, auto-locating it under `search_dir` when no path
/// is given.
pub fn load_head(
    coverage_file: Option<&Path>,
    search_dir: &Path,
    format: FormatArg,
) -> Result<(Report, PathBuf)> {
    let path = match coverage_file {
        Some(p) => p.to_path_buf(),
        None => {
            let found = ingest::locate_coverage_file(search_dir).with_context(|| {
                format!(
                    "No coverage file found in {}. Specify with --coverage-file",
                    search_dir.display()
                )
            })?;
            info!("Auto-detected coverage file: {}", found.display());
            found
        }
    };

    let (report, _) = ingest::load_report(&path, format.format())
        .with_context(|| format!("Failed to load coverage file {}", path.display()))?;
    Ok((report, path))
}

/// Load the base report. A base that cannot be loaded is reported and
/// skipped, leaving a head-only comparison.
pub fn load_base(path: Option<&Path>, format: FormatArg) -> Option<Report> {
    let path = path?;
    match ingest::load_report(path, format.format()) {
        Ok((report, _)) => Some(report),
        Err(e) => {
            warn!("Ignoring base coverage file {}: {e}", path.display());
            None
        }
    }
}

/// Plain-text summary printed at the end of a run.
pub fn cmd_summary(comparison: &Comparison) -> String {
    let mut out = String::new();
    let Some(head) = &comparison.head else {
        return "No coverage data.\n".to_string();
    };
    writeln!(out, "Coverage: {:.2}%", head.coverage).unwrap();
    if comparison.base.is_some() {
        writeln!(out, "Delta:    {:+.2}%", comparison.coverage_delta).unwrap();
    }
    writeln!(out, "Lines:    {}/{}", head.total_covered, head.total_lines).unwrap();
    writeln!(out, "Files:    {}", head.files.len()).unwrap();
    out
}

/// Workflow commands annotating uncovered lines added by the diff.
pub fn cmd_annotate(report: &Report, source: &dyn DiffSource) -> Result<String> {
    let diff_text = source.fetch_diff()?;
    let diffs = diff::parse_unified_diff(&diff_text);
    let annotations = annotate::annotations(report, &diffs);
    info!("{} uncovered ranges in added lines", annotations.len());

    let mut out = String::new();
    for a in &annotations {
        writeln!(out, "{}", annotate::workflow_command(a)).unwrap();
    }
    Ok(out)
}

/// `key=value` lines for the GitHub Actions step outputs file.
pub fn step_outputs(report: &Report) -> String {
    let mut out = String::new();
    writeln!(out, "coverage={:.2}", report.coverage).unwrap();
    writeln!(out, "lines-covered={}", report.total_covered).unwrap();
    writeln!(out, "lines-total={}", report.total_lines).unwrap();
    writeln!(out, "files-count={}", report.files.len()).unwrap();
    out
}

/// Append [`step_outputs`] to the file at `path`.
pub fn write_step_outputs(path: &Path, report: &Report) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(step_outputs(report).as_bytes())
        .context("Failed to write step outputs")?;
    Ok(())
}
