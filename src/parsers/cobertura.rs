/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="...">
///             <methods>...</methods>
///             <lines>
///               <line number="..." hits="..." />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Only `class > lines > line` entries are counted; per-method line tables
/// repeat the class table and are skipped. Classes sharing a filename (even
/// across packages) merge into one file, and within a file the first entry
/// for a given line number wins.
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CovError, Result};
use crate::model::{FileCoverage, Report};

/// Directory markers that usually begin the project-relative part of a
/// `<source>` path.
const SOURCE_MARKERS: &[&str] = &["/src/", "/lib/", "/app/", "/tests/", "/test/", "/python/"];

/// Source directory names that are themselves project-relative roots.
const SOURCE_DIRS: &[&str] = &["src", "lib", "app", "tests", "test", "python", "py"];

/// Accumulates merged per-file coverage in first-appearance order.
#[derive(Default)]
struct FileTable {
    files: Vec<FileCoverage>,
    index: HashMap<String, usize>,
    seen_lines: Vec<HashSet<u32>>,
}

impl FileTable {
    fn entry(&mut self, path: String) -> usize {
        if let Some(&idx) = self.index.get(&path) {
            return idx;
        }
        let idx = self.files.len();
        self.index.insert(path.clone(), idx);
        self.files.push(FileCoverage::new(path));
        self.seen_lines.push(HashSet::new());
        idx
    }

    fn record_line(&mut self, idx: usize, line_number: u32, hits: i64) {
        if !self.seen_lines[idx].insert(line_number) {
            return;
        }
        let file = &mut self.files[idx];
        file.lines_total += 1;
        if hits > 0 {
            file.lines_covered += 1;
        } else {
            file.uncovered_lines.push(line_number);
        }
    }
}

/// Parse Cobertura XML from a buffered reader.
pub fn parse<R: BufRead>(input: R) -> Result<Report> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    let mut sources: Vec<String> = Vec::new();
    let mut table = FileTable::default();
    let mut current_file: Option<usize> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e, &reader))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = e.local_name().as_ref().to_vec();

                if !seen_root {
                    if name != b"coverage" {
                        return Err(CovError::Parse(format!(
                            "expected <coverage> root element, found <{}>",
                            String::from_utf8_lossy(&name)
                        )));
                    }
                    seen_root = true;
                }

                match name.as_slice() {
                    b"class" => {
                        let filename = attr(e, b"filename", &reader)?;
                        let idx = filename.map(|f| table.entry(resolve_filename(&f, &sources)));
                        if is_start {
                            current_file = idx;
                        }
                    }
                    b"line" if in_class_lines(&stack) => {
                        if let Some(idx) = current_file {
                            let line_number = numeric_attr::<u32, _>(e, b"number", &reader)?;
                            let hits = numeric_attr::<i64, _>(e, b"hits", &reader)?;
                            table.record_line(idx, line_number, hits);
                        }
                    }
                    _ => {}
                }

                if is_start {
                    stack.push(name);
                }
            }
            Event::Text(ref e) => {
                if stack.last().map(Vec::as_slice) == Some(&b"source"[..]) {
                    let text = e.unescape().map_err(|e| xml_error(e, &reader))?;
                    sources.push(text.into_owned());
                }
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some(&b"class"[..]) {
                    current_file = None;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(CovError::Parse("missing <coverage> root element".to_string()));
    }
    if let Some(open) = stack.last() {
        return Err(CovError::Parse(format!(
            "unexpected end of document inside <{}>",
            String::from_utf8_lossy(open)
        )));
    }

    Ok(Report::from_files(table.files))
}

/// True when the innermost open elements are `<class><lines>`.
fn in_class_lines(stack: &[Vec<u8>]) -> bool {
    matches!(stack, [.., class, lines] if class == b"class" && lines == b"lines")
}

fn xml_error<R>(source: quick_xml::Error, reader: &Reader<R>) -> CovError {
    CovError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Look up a single attribute by local name, unescaped.
fn attr<R>(e: &BytesStart, key: &[u8], reader: &Reader<R>) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| xml_error(quick_xml::Error::InvalidAttr(err), reader))?;
        if a.key.local_name().as_ref() == key {
            let value = a.unescape_value().map_err(|err| xml_error(err, reader))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Numeric attribute; absent means zero, non-numeric is a decode failure.
fn numeric_attr<T, R>(e: &BytesStart, key: &[u8], reader: &Reader<R>) -> Result<T>
where
    T: str::FromStr + Default,
{
    match attr(e, key, reader)? {
        None => Ok(T::default()),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            CovError::Parse(format!(
                "invalid {} attribute '{}' at position {}",
                String::from_utf8_lossy(key),
                raw,
                reader.buffer_position()
            ))
        }),
    }
}

/// Map a class filename to a repo-relative path using the `<source>` list.
///
/// Absolute filenames lose the first source that prefixes them. Relative
/// filenames gain the project-relative part of the first source, when one
/// can be derived.
fn resolve_filename(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        for source in sources {
            let source = source.trim();
            if source.is_empty() {
                continue;
            }
            if let Some(rel) = filename.strip_prefix(source) {
                let rel = rel.trim_start_matches('/');
                if !rel.is_empty() {
                    return rel.to_string();
                }
            }
        }
        return filename.to_string();
    }

    if let Some(source) = sources.first().map(|s| s.trim()) {
        if !source.is_empty() {
            let project = extract_project_path(source);
            if !project.is_empty() && project != "/" {
                return join_clean(&project, filename);
            }
        }
    }
    filename.to_string()
}

/// Join two relative paths, dropping `.` segments and resolving `..`
/// lexically.
fn join_clean(base: &str, rel: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." if segments.last().is_some_and(|s| *s != "..") => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Derive a project-relative directory from an absolute source directory.
///
/// `/home/runner/work/repo/repo/src` -> `src` (CI checkouts repeat the repo
/// name), `/opt/build/src/pkg` -> `src/pkg`, `/somewhere/lib` -> `lib`.
fn extract_project_path(source: &str) -> String {
    let parts: Vec<&str> = source.split('/').collect();
    for i in 0..parts.len().saturating_sub(1) {
        if !parts[i].is_empty() && parts[i] == parts[i + 1] && i + 2 < parts.len() {
            return parts[i + 2..].join("/");
        }
    }

    for marker in SOURCE_MARKERS {
        if let Some(idx) = source.rfind(marker) {
            return source[idx + 1..].to_string();
        }
    }

    let base = source.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if SOURCE_DIRS.contains(&base) {
        return base.to_string();
    }
    String::new()
}
