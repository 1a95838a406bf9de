use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unable to detect coverage format")]
    UnknownFormat,
}

pub type Result<T> = std::result::Result<T, CovError>;
