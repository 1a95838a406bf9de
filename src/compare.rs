//! Reconcile a head report against an optional base report and an optional
//! list of files changed in version control.
//!
//! Coverage paths and version-control paths rarely agree verbatim, so every
//! lookup here goes through the boundary-suffix matching in [`crate::paths`].
//! Nothing in this module fails: a missing counterpart is simply "not found".

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{Comparison, FileChange, FileCoverage, Report};
use crate::paths::{find_matching_changed_file, is_source_file, paths_match};

/// Compare `head` against `base`, optionally restricted to `changed_files`.
///
/// With a non-empty `changed_files`, only head files matching a changed path
/// are reported (under the changed path), and changed source files missing
/// from `head` entirely are appended with `no_coverage` set. The head-derived
/// entries come first in head order, then the synthesized ones in
/// `changed_files` order.
#[must_use]
pub fn compare(head: Option<Report>, base: Option<Report>, changed_files: &[String]) -> Comparison {
    let Some(head) = head else {
        return Comparison::default();
    };

    let coverage_delta = base.as_ref().map_or(0.0, |b| head.coverage - b.coverage);
    let file_changes = file_changes(&head, base.as_ref(), changed_files);

    debug!(
        files = file_changes.len(),
        delta = coverage_delta,
        has_base = base.is_some(),
        "comparison built"
    );

    Comparison {
        head: Some(head),
        base,
        coverage_delta,
        file_changes,
    }
}

fn file_changes(head: &Report, base: Option<&Report>, changed: &[String]) -> Vec<FileChange> {
    let base_index = base.map(BaseIndex::new);
    let lookup = |path: &str| base_index.as_ref().and_then(|idx| idx.find(path));

    let filtering = !changed.is_empty();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut changes = Vec::new();

    for file in &head.files {
        let path = if filtering {
            match find_matching_changed_file(&file.path, changed) {
                Some(matched) => {
                    seen.insert(matched);
                    matched.to_string()
                }
                None => continue,
            }
        } else {
            file.path.clone()
        };

        // Base lookup uses the coverage tool's own path; base and head come
        // from the same tool and share its path conventions.
        let head_coverage = file.percentage();
        let base_file = lookup(&file.path);
        let base_coverage = base_file.map_or(0.0, FileCoverage::percentage);

        changes.push(FileChange {
            path,
            head_coverage,
            base_coverage,
            delta: head_coverage - base_coverage,
            is_new: base_file.is_none(),
            no_coverage: false,
        });
    }

    if filtering {
        for path in changed {
            if !is_source_file(path) || !seen.insert(path.as_str()) {
                continue;
            }
            let mut change = FileChange {
                path: path.clone(),
                head_coverage: 0.0,
                base_coverage: 0.0,
                delta: 0.0,
                is_new: true,
                no_coverage: true,
            };
            // Covered before, nothing now: a regression rather than a new file.
            if let Some(base_file) = lookup(path) {
                change.base_coverage = base_file.percentage();
                change.delta = -change.base_coverage;
                change.is_new = false;
            }
            changes.push(change);
        }
    }

    changes
}

/// Base files by exact path, with a boundary-suffix fallback scan.
struct BaseIndex<'a> {
    report: &'a Report,
    by_path: HashMap<&'a str, &'a FileCoverage>,
}

impl<'a> BaseIndex<'a> {
    fn new(report: &'a Report) -> Self {
        let mut by_path = HashMap::new();
        for file in &report.files {
            // Keep the first entry for duplicate paths (LCOV does not merge).
            by_path.entry(file.path.as_str()).or_insert(file);
        }
        Self { report, by_path }
    }

    fn find(&self, path: &str) -> Option<&'a FileCoverage> {
        if let Some(&file) = self.by_path.get(path) {
            return Some(file);
        }
        self.report.files.iter().find(|f| paths_match(path, &f.path))
    }
}
