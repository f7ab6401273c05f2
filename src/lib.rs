//! Job alerts library: skill clustering of job postings and keyword alerts

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod notify;
pub mod output;
pub mod processing;
pub mod storage;

pub use config::Config;
pub use error::{JobAlertError, Result};
pub use processing::pipeline::{Pipeline, PipelineSettings, RunReport};
