/// Auto-detection of coverage file formats.
///
/// Detection sniffs at most the first [`SNIFF_LEN`] bytes of the input and
/// looks for markers of each format. XML markers win over LCOV markers.
use std::io::{Read, Seek, SeekFrom};

use crate::error::{CovError, Result};

/// Number of leading bytes inspected by the detector.
pub const SNIFF_LEN: usize = 1024;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cobertura,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Lcov => "lcov",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobertura" | "xml" => Ok(Format::Cobertura),
            "lcov" => Ok(Format::Lcov),
            _ => Err(CovError::Parse(format!(
                "Unknown format: '{}'. Supported: lcov, cobertura (xml)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the format of a seekable stream.
///
/// Reads up to [`SNIFF_LEN`] bytes from the current position, then seeks
/// back so the caller can hand the same stream to a parser.
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<Format> {
    let start = reader.stream_position()?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    reader.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    reader.seek(SeekFrom::Start(start))?;

    detect_format_bytes(&head).ok_or(CovError::UnknownFormat)
}

/// Classify an in-memory prefix. Only the first [`SNIFF_LEN`] bytes count.
pub fn detect_format_bytes(content: &[u8]) -> Option<Format> {
    let head_len = content.len().min(SNIFF_LEN);
    let head = String::from_utf8_lossy(&content[..head_len]);

    if head.contains("<?xml") || head.contains("<coverage") {
        return Some(Format::Cobertura);
    }
    if head.contains("SF:") || head.contains("end_of_record") {
        return Some(Format::Lcov);
    }
    None
}
