pub mod cobertura;
pub mod lcov;

use std::io::BufRead;

use crate::detect::Format;
use crate::error::Result;
use crate::model::Report;

impl Format {
    /// Parse a report in this format from a buffered reader.
    pub fn parse<R: BufRead>(self, reader: R) -> Result<Report> {
        match self {
            Format::Cobertura => cobertura::parse(reader),
            Format::Lcov => lcov::parse(reader),
        }
    }
}
