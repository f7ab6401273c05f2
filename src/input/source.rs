//! Posting sources: where a run's raw records come from

use crate::error::{JobAlertError, Result};
use crate::input::file_detector::FileType;
use crate::processing::posting::RawPosting;
use log::{info, warn};
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;

/// Anything that can produce a complete batch of raw postings for a keyword.
///
/// One "page" is the unit the listings site serves; `page_count` bounds how
/// many of them are collected.
pub trait PostingSource {
    fn fetch(
        &self,
        keyword: &str,
        page_count: usize,
    ) -> impl std::future::Future<Output = Result<Vec<RawPosting>>> + Send;
}

/// Reads previously captured postings from a `.json` array or `.jsonl` file.
pub struct FileSource {
    path: PathBuf,
    page_size: usize,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size: page_size.max(1),
        }
    }

    async fn read_records(&self) -> Result<Vec<Value>> {
        let file_type = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(FileType::from_extension)
            .unwrap_or(FileType::Unknown);

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            JobAlertError::SourceUnavailable(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        match file_type {
            FileType::Json => serde_json::from_str::<Vec<Value>>(&content).map_err(|e| {
                JobAlertError::SourceUnavailable(format!(
                    "{} is not a JSON array of postings: {}",
                    self.path.display(),
                    e
                ))
            }),
            FileType::JsonLines => Ok(content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .filter_map(|(number, line)| match serde_json::from_str::<Value>(line) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Skipping unparsable line {} in {}: {}", number + 1, self.path.display(), e);
                        None
                    }
                })
                .collect()),
            FileType::Unknown => Err(JobAlertError::SourceUnavailable(format!(
                "Unsupported posting file: {}",
                self.path.display()
            ))),
        }
    }
}

impl PostingSource for FileSource {
    async fn fetch(&self, keyword: &str, page_count: usize) -> Result<Vec<RawPosting>> {
        info!("Reading postings from {}", self.path.display());
        let values = self.read_records().await?;

        let mut records = Vec::with_capacity(values.len());
        for (position, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<RawPosting>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed posting #{}: {}", position + 1, e),
            }
        }

        Ok(select_pages(records, keyword, page_count, self.page_size))
    }
}

/// In-memory postings, for fixtures and tests.
pub struct StaticSource {
    records: Vec<RawPosting>,
    page_size: usize,
}

impl StaticSource {
    pub fn new(records: Vec<RawPosting>) -> Self {
        Self {
            records,
            page_size: usize::MAX,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl PostingSource for StaticSource {
    async fn fetch(&self, keyword: &str, page_count: usize) -> Result<Vec<RawPosting>> {
        Ok(select_pages(self.records.clone(), keyword, page_count, self.page_size))
    }
}

/// Keep records mentioning `keyword`, then cut the first `page_count` pages.
fn select_pages(records: Vec<RawPosting>, keyword: &str, page_count: usize, page_size: usize) -> Vec<RawPosting> {
    let keyword = keyword.trim().to_lowercase();
    let limit = page_count.saturating_mul(page_size);

    let selected: Vec<RawPosting> = records
        .into_iter()
        .filter(|record| keyword.is_empty() || mentions(record, &keyword))
        .take(limit)
        .collect();

    for (page, chunk) in selected.chunks(page_size).enumerate() {
        info!("Page {}: {} postings", page + 1, chunk.len());
    }
    selected
}

fn mentions(record: &RawPosting, keyword: &str) -> bool {
    [&record.title, &record.summary, &record.skills]
        .iter()
        .any(|field| field.to_lowercase().contains(keyword))
}
