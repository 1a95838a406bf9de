#![allow(dead_code)]

use std::path::{Path, PathBuf};

use prcov::model::{FileCoverage, Report};
use tempfile::TempDir;

/// Write `content` to `name` inside a fresh temporary directory.
/// The caller must hold onto `TempDir` to keep the file alive.
pub fn write_temp(name: &str, content: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn file(path: &str, covered: u64, total: u64, uncovered: &[u32]) -> FileCoverage {
    FileCoverage {
        path: path.to_string(),
        lines_covered: covered,
        lines_total: total,
        uncovered_lines: uncovered.to_vec(),
    }
}

pub fn report(files: Vec<FileCoverage>) -> Report {
    Report::from_files(files)
}
