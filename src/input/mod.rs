//! Posting sources

pub mod file_detector;
pub mod source;

pub use source::{FileSource, PostingSource, StaticSource};
