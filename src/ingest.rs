use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::detect::{detect_format, Format};
use crate::error::Result;
use crate::model::Report;

/// Well-known report locations, checked in order by [`locate_coverage_file`].
pub const CANDIDATE_FILES: &[&str] = &[
    "coverage.lcov",
    "lcov.info",
    "coverage/lcov.info",
    "coverage.xml",
    "cobertura.xml",
    "coverage/cobertura.xml",
    "coverage/coverage.xml",
];

/// Output directories that coverage tools write into inside a sub-project.
const COVERAGE_DIRS: &[&str] = &["/coverage/", "/coverage-reports/", "/__coverage__/"];

/// Open a coverage file, auto-detect its format (or use the override) and
/// parse it. Returns the report and the format it was parsed as.
///
/// Relative LCOV paths are prefixed with the sub-project directory derived
/// from `path` (see [`extract_source_prefix`]).
pub fn load_report(path: &Path, format: Option<Format>) -> Result<(Report, Format)> {
    let mut reader = BufReader::new(File::open(path)?);

    let format = match format {
        Some(f) => f,
        None => detect_format(&mut reader)?,
    };
    debug!(path = %path.display(), %format, "parsing coverage file");

    let mut report = format.parse(reader)?;
    if format == Format::Lcov {
        if let Some(prefix) = extract_source_prefix(path) {
            debug!(%prefix, "prefixing relative LCOV paths");
            apply_source_prefix(&mut report, &prefix);
        }
    }
    info!(
        "Loaded {} as {}: {} files, {:.2}% coverage",
        path.display(),
        format,
        report.files.len(),
        report.coverage
    );
    Ok((report, format))
}

/// First existing well-known coverage file under `dir`.
pub fn locate_coverage_file(dir: &Path) -> Option<PathBuf> {
    CANDIDATE_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Sub-project directory a coverage file belongs to, taken from the part of
/// its (relative) path before the coverage output directory.
///
/// `js/coverage/lcov.info` -> `js`; `python/coverage.xml` -> `None`.
/// Absolute paths carry no repo-relative information and yield `None`.
pub fn extract_source_prefix(path: &Path) -> Option<String> {
    if path.is_absolute() {
        return None;
    }
    let s = path.to_str()?;

    for dir in COVERAGE_DIRS {
        if let Some(idx) = s.find(dir).filter(|&i| i > 0) {
            let prefix = &s[..idx];
            let prefix = prefix.strip_prefix("./").unwrap_or(prefix);
            if !prefix.is_empty() && prefix != "." {
                return Some(prefix.to_string());
            }
        }
    }

    let dir = path.parent()?;
    let dir_name = dir.file_name()?.to_str()?;
    if dir_name == "coverage" || dir_name == "__coverage__" {
        let parent = dir.parent()?.to_str()?;
        if !parent.is_empty() && parent != "." {
            return Some(parent.to_string());
        }
    }
    None
}

/// Prefix every relative file path with `prefix`, unless it already starts
/// with it.
pub fn apply_source_prefix(report: &mut Report, prefix: &str) {
    let prefix = prefix.trim_end_matches('/');
    let with_slash = format!("{prefix}/");
    for file in &mut report.files {
        if file.path.starts_with('/') || file.path.starts_with(&with_slash) {
            continue;
        }
        let rel = file.path.strip_prefix("./").unwrap_or(&file.path);
        file.path = format!("{with_slash}{rel}");
    }
}
