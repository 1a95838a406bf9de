pub mod annotate;
pub mod cli;
pub mod compare;
pub mod detect;
pub mod diff;
pub mod error;
pub mod github;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod paths;
pub mod render;
