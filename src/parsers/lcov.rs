/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records used:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Everything else (TN, FN, BRDA, ...) is ignored. Malformed records,
/// including ones with invalid UTF-8, are skipped rather than failing the
/// parse, and a file block that never reaches `end_of_record` is dropped.
use std::io::BufRead;

use tracing::debug;

use crate::error::Result;
use crate::model::{FileCoverage, Report};

/// Parse LCOV coverage data from a buffered reader.
pub fn parse<R: BufRead>(mut reader: R) -> Result<Report> {
    let mut report = Report::new();
    let mut current_file: Option<FileCoverage> = None;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break; // EOF
        }

        // Bytes that are not UTF-8 become U+FFFD; a numeric field holding
        // them then fails to parse and its record is skipped.
        let raw_line = String::from_utf8_lossy(&buf);
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(file) = current_file.take() {
                report.files.push(file);
            }
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        match tag {
            "SF" => {
                if let Some(dropped) = current_file.replace(FileCoverage::new(value.to_string())) {
                    debug!(path = %dropped.path, "LCOV record without end_of_record dropped");
                }
            }
            "DA" => {
                // DA before any SF has nowhere to go.
                if let Some(file) = current_file.as_mut() {
                    match parse_da(value) {
                        Some((line_number, hits)) => {
                            file.lines_total += 1;
                            if hits > 0 {
                                file.lines_covered += 1;
                            } else {
                                file.uncovered_lines.push(line_number);
                            }
                        }
                        None => debug!(record = line, "skipping malformed DA record"),
                    }
                }
            }
            "LF" => {
                if let (Some(file), Some(n)) = (current_file.as_mut(), parse_count(value)) {
                    file.lines_total = n;
                }
            }
            "LH" => {
                if let (Some(file), Some(n)) = (current_file.as_mut(), parse_count(value)) {
                    file.lines_covered = n;
                }
            }
            _ => {}
        }
    }

    if let Some(dropped) = current_file {
        debug!(path = %dropped.path, "LCOV data ended inside a record; dropped");
    }

    report.calculate();
    Ok(report)
}

/// `DA:<line>,<hits>[,<checksum>]` -> `(line, hits)`.
fn parse_da(value: &str) -> Option<(u32, i64)> {
    let mut parts = value.splitn(3, ',');
    let line_number = parts.next()?.trim().parse::<u32>().ok()?;
    let hits = parts.next()?.trim().parse::<i64>().ok()?;
    Some((line_number, hits))
}

/// LF/LH summary counts only override the tally when positive.
fn parse_count(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> Report {
        parse(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_single_record() {
        let report = parse_str("SF:/a.go\nDA:1,1\nDA:2,0\nend_of_record\n");
        assert_eq!(report.files.len(), 1);

        let file = &report.files[0];
        assert_eq!(file.path, "/a.go");
        assert_eq!(file.lines_covered, 1);
        assert_eq!(file.lines_total, 2);
        assert_eq!(file.uncovered_lines, vec![2]);
        assert_eq!(report.coverage, 50.0);
    }

    #[test]
    fn test_parse_drops_da_before_sf() {
        let report = parse_str("DA:1,1\nSF:/a.go\nDA:2,1\nend_of_record\n");
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].lines_total, 1);
        assert_eq!(report.files[0].lines_covered, 1);
    }

    #[test]
    fn test_parse_drops_unterminated_record() {
        let report = parse_str("SF:/a.go\nDA:1,1\n");
        assert!(report.files.is_empty());
        assert_eq!(report.total_lines, 0);
    }

    #[test]
    fn test_parse_sf_discards_open_record() {
        let report = parse_str("SF:/a.go\nDA:1,1\nSF:/b.go\nDA:1,0\nend_of_record\n");
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].path, "/b.go");
        assert_eq!(report.files[0].uncovered_lines, vec![1]);
    }

    #[test]
    fn test_parse_skips_malformed_da() {
        let report = parse_str("SF:/a.go\nDA:1\nDA:x,1\nDA:2,y\nDA:3,4,abc123\nend_of_record\n");
        let file = &report.files[0];
        assert_eq!(file.lines_total, 1);
        assert_eq!(file.lines_covered, 1);
    }

    #[test]
    fn test_parse_lf_lh_override() {
        let report = parse_str("SF:/a.go\nDA:1,1\nDA:2,0\nLF:10\nLH:7\nend_of_record\n");
        let file = &report.files[0];
        assert_eq!(file.lines_total, 10);
        assert_eq!(file.lines_covered, 7);
        // Uncovered lines still come from DA records.
        assert_eq!(file.uncovered_lines, vec![2]);
        assert_eq!(report.total_lines, 10);
    }

    #[test]
    fn test_parse_lf_lh_zero_ignored() {
        let report = parse_str("SF:/a.go\nDA:1,1\nDA:2,0\nLF:0\nLH:0\nLF:junk\nend_of_record\n");
        let file = &report.files[0];
        assert_eq!(file.lines_total, 2);
        assert_eq!(file.lines_covered, 1);
    }

    #[test]
    fn test_parse_duplicate_records_not_merged() {
        let report = parse_str(
            "SF:/a.go\nDA:1,1\nend_of_record\nSF:/a.go\nDA:1,0\nend_of_record\n",
        );
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.total_lines, 2);
        assert_eq!(report.total_covered, 1);
    }

    #[test]
    fn test_parse_uncovered_order_preserved() {
        let report = parse_str("SF:/a.go\nDA:9,0\nDA:3,0\nDA:5,0\nend_of_record\n");
        assert_eq!(report.files[0].uncovered_lines, vec![9, 3, 5]);
    }

    #[test]
    fn test_parse_blank_lines_and_crlf() {
        let report = parse_str("\r\nTN:\r\nSF:/a.go\r\n\r\nDA:1,3\r\nend_of_record\r\n");
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].path, "/a.go");
        assert_eq!(report.files[0].lines_covered, 1);
    }

    #[test]
    fn test_parse_stray_end_of_record() {
        let report = parse_str("end_of_record\nend_of_record\n");
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_parse_empty() {
        let report = parse_str("");
        assert!(report.files.is_empty());
        assert_eq!(report.coverage, 0.0);
    }

    #[test]
    fn test_parse_invalid_utf8_in_hits_skips_record() {
        let report = parse(&b"SF:/a.go\nDA:1,1\nDA:2,\xff\nDA:3,0\nend_of_record\n"[..]).unwrap();
        assert_eq!(report.files.len(), 1);
        let file = &report.files[0];
        assert_eq!(file.lines_total, 2);
        assert_eq!(file.lines_covered, 1);
        assert_eq!(file.uncovered_lines, vec![3]);
    }

    #[test]
    fn test_parse_invalid_utf8_in_path_keeps_records() {
        let input = b"SF:/src/caf\xe9.go\nDA:1,1\nend_of_record\nSF:/b.go\nDA:1,0\nend_of_record\n";
        let report = parse(&input[..]).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].path, "/src/caf\u{FFFD}.go");
        assert_eq!(report.files[0].lines_covered, 1);
        assert_eq!(report.files[1].path, "/b.go");
        assert_eq!(report.total_lines, 2);
    }
}
