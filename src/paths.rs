//! Path heuristics shared by the comparison engine and the annotator.
//!
//! Coverage tools report paths in whatever form their build saw them: Go
//! module paths (`github.com/user/repo/pkg/x.go`), absolute checkout paths
//! (`/home/runner/work/repo/src/x.py`), or repo-relative paths. Version
//! control always speaks repo-relative. These helpers bridge the two.

/// Directory markers that usually start the repo-relative part of a path.
const ANNOTATION_MARKERS: &[&str] = &[
    "/internal/",
    "/cmd/",
    "/pkg/",
    "/api/",
    "/src/",
    "/lib/",
    "/app/",
    "/test/",
    "/tests/",
];

/// Whether a repo-relative path is a source file that should carry coverage.
///
/// Recognizes Go and Python files. Tests, vendored code, generated code,
/// caches and packaging files are excluded.
#[must_use]
pub fn is_source_file(path: &str) -> bool {
    if path.ends_with(".go") {
        is_go_source_file(path)
    } else if path.ends_with(".py") {
        is_python_source_file(path)
    } else {
        false
    }
}

fn is_go_source_file(path: &str) -> bool {
    if path.ends_with("_test.go") {
        return false;
    }
    if path.starts_with("vendor/") || path.contains("/vendor/") {
        return false;
    }
    let generated = path.contains("generated")
        || path.ends_with(".pb.go")
        || path.ends_with("_mock.go")
        || path.contains("mock_");
    !generated
}

fn is_python_source_file(path: &str) -> bool {
    let base = file_name(path);

    if path.contains("__pycache__") {
        return false;
    }
    if path.ends_with("_test.py") || base.starts_with("test_") {
        return false;
    }
    if base == "conftest.py" || base == "setup.py" {
        return false;
    }
    for venv in ["venv/", ".venv/"] {
        if path.starts_with(venv) || path.contains(&format!("/{venv}")) {
            return false;
        }
    }
    !path.contains("/site-packages/")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True iff `path` equals `candidate`, or ends with it right after a `/`.
///
/// `"cmd/main.go"` ends with `"main.go"`; `"xmain.go"` does not.
#[must_use]
pub fn has_suffix_with_boundary(path: &str, candidate: &str) -> bool {
    if path == candidate {
        return true;
    }
    if candidate.len() >= path.len() || !path.ends_with(candidate) {
        return false;
    }
    path.as_bytes()[path.len() - candidate.len() - 1] == b'/'
}

/// True when either path is a boundary suffix of the other.
#[must_use]
pub fn paths_match(a: &str, b: &str) -> bool {
    has_suffix_with_boundary(a, b) || has_suffix_with_boundary(b, a)
}

/// Find the changed file that a coverage path refers to.
///
/// Exact match wins. Otherwise the first entry (in `changed` order) where
/// either path is a boundary suffix of the other is returned. When several
/// entries qualify, which one is returned is not part of the contract.
#[must_use]
pub fn find_matching_changed_file<'a>(
    coverage_path: &str,
    changed: &'a [String],
) -> Option<&'a str> {
    if let Some(exact) = changed.iter().find(|c| c.as_str() == coverage_path) {
        return Some(exact);
    }
    changed
        .iter()
        .find(|c| paths_match(coverage_path, c))
        .map(String::as_str)
}

/// Best-effort conversion of a module-qualified or absolute path into a
/// repo-relative one.
///
/// Returns the tail starting at the first known source-tree marker
/// (`internal/`, `cmd/`, `src/`, ...). Failing that, a path whose first
/// segment looks like a domain (`github.com/user/repo/x.go`) loses its
/// first three segments. Anything else is returned unchanged.
#[must_use]
pub fn normalize_path_for_annotation(path: &str) -> String {
    for marker in ANNOTATION_MARKERS {
        if let Some(idx) = path.find(marker) {
            return path[idx + 1..].to_string();
        }
    }

    let parts: Vec<&str> = path.splitn(4, '/').collect();
    if parts.len() == 4 && (parts[0].contains('.') || parts[0] == "github") {
        return parts[3].to_string();
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_source_file_go() {
        assert!(is_source_file("cmd/app/main.go"));
        assert!(is_source_file("internal/foo/bar.go"));
        assert!(is_source_file("pkg/util/helper.go"));
        assert!(!is_source_file("cmd/app/main_test.go"));
        assert!(!is_source_file("vendor/github.com/pkg/errors/errors.go"));
        assert!(!is_source_file("internal/vendor/code.go"));
        assert!(!is_source_file("internal/generated/code.go"));
        assert!(!is_source_file("api/v1/types.pb.go"));
        assert!(!is_source_file("internal/mocks/mock_service.go"));
        assert!(!is_source_file("internal/test/service_mock.go"));
    }

    #[test]
    fn test_is_source_file_python() {
        assert!(is_source_file("src/mypackage/module.py"));
        assert!(is_source_file("lib/utils/helper.py"));
        assert!(is_source_file("app/main.py"));
        assert!(!is_source_file("src/mypackage/test_module.py"));
        assert!(!is_source_file("src/mypackage/module_test.py"));
        assert!(!is_source_file("tests/test_something.py"));
        assert!(!is_source_file("conftest.py"));
        assert!(!is_source_file("tests/conftest.py"));
        assert!(!is_source_file("setup.py"));
        assert!(!is_source_file("src/__pycache__/module.py"));
        assert!(!is_source_file("venv/lib/python3.9/site-packages/pkg.py"));
        assert!(!is_source_file(".venv/lib/python3.9/site-packages/pkg.py"));
        assert!(!is_source_file("project/.venv/lib/pkg.py"));
        assert!(!is_source_file("opt/python/site-packages/pkg.py"));
    }

    #[test]
    fn test_is_source_file_other() {
        assert!(!is_source_file(".github/workflows/ci.yml"));
        assert!(!is_source_file("README.md"));
        assert!(!is_source_file("package.json"));
        assert!(!is_source_file("__pycache__/module.cpython-39.pyc"));
    }

    #[test]
    fn test_has_suffix_with_boundary() {
        assert!(has_suffix_with_boundary("cmd/app/main.go", "cmd/app/main.go"));
        assert!(has_suffix_with_boundary(
            "github.com/user/repo/cmd/app/main.go",
            "cmd/app/main.go"
        ));
        assert!(has_suffix_with_boundary(
            "/home/runner/work/repo/src/module.py",
            "src/module.py"
        ));
        assert!(has_suffix_with_boundary("cmd/main.go", "main.go"));
        assert!(has_suffix_with_boundary("cmd/app/main.go", "app/main.go"));
        assert!(has_suffix_with_boundary("main.go", "main.go"));
        assert!(!has_suffix_with_boundary("cmd/app/main.go", "other.go"));
        assert!(!has_suffix_with_boundary("xmain.go", "main.go"));
        assert!(!has_suffix_with_boundary("main.go", "xmain.go"));
        // An empty candidate only matches after a trailing separator.
        assert!(has_suffix_with_boundary("cmd/", ""));
        assert!(!has_suffix_with_boundary("cmd", ""));
    }

    #[test]
    fn test_find_matching_changed_file() {
        let changed = vec![
            "cmd/app/main.go".to_string(),
            "internal/foo/handler.go".to_string(),
            "src/mypackage/module.py".to_string(),
        ];

        assert_eq!(
            find_matching_changed_file("cmd/app/main.go", &changed),
            Some("cmd/app/main.go")
        );
        assert_eq!(
            find_matching_changed_file("github.com/user/repo/cmd/app/main.go", &changed),
            Some("cmd/app/main.go")
        );
        assert_eq!(
            find_matching_changed_file("github.com/user/repo/internal/foo/handler.go", &changed),
            Some("internal/foo/handler.go")
        );
        assert_eq!(
            find_matching_changed_file("/home/runner/work/repo/src/mypackage/module.py", &changed),
            Some("src/mypackage/module.py")
        );
        assert_eq!(find_matching_changed_file("internal/other/file.go", &changed), None);
        assert_eq!(find_matching_changed_file("src/other/module.py", &changed), None);
    }

    #[test]
    fn test_find_matching_changed_file_coverage_path_shorter() {
        // Coverage tool reported a path relative to a sub-directory.
        let changed = vec!["services/api/handler.go".to_string()];
        assert_eq!(
            find_matching_changed_file("api/handler.go", &changed),
            Some("services/api/handler.go")
        );
    }

    #[test]
    fn test_find_matching_changed_file_prefers_exact() {
        let changed = vec!["a/main.go".to_string(), "main.go".to_string()];
        assert_eq!(find_matching_changed_file("main.go", &changed), Some("main.go"));
    }

    #[test]
    fn test_normalize_path_for_annotation() {
        let cases = [
            ("github.com/user/repo/internal/foo.go", "internal/foo.go"),
            ("github.com/user/repo/cmd/app/main.go", "cmd/app/main.go"),
            ("github.com/user/repo/pkg/util/helper.go", "pkg/util/helper.go"),
            ("gitlab.com/user/repo/api/handler.go", "api/handler.go"),
            ("/home/runner/work/repo/src/mypackage/module.py", "src/mypackage/module.py"),
            ("/home/runner/work/repo/lib/utils.py", "lib/utils.py"),
            ("/home/runner/work/repo/app/main.py", "app/main.py"),
            ("/home/runner/work/repo/tests/test_module.py", "tests/test_module.py"),
            ("github.com/user/repo/main.go", "main.go"),
            ("internal/foo.go", "internal/foo.go"),
            ("src/module.py", "src/module.py"),
            ("simple.go", "simple.go"),
            ("module.py", "module.py"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_path_for_annotation(input), expected, "input: {input}");
        }
    }
}
