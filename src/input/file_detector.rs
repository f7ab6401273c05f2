//! Posting file format detection

#[derive(Debug, Clone, PartialEq)]
pub enum FileType {
    /// A single JSON array of posting records
    Json,
    /// One JSON posting record per line
    JsonLines,
    Unknown,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "json" => FileType::Json,
            "jsonl" | "ndjson" => FileType::JsonLines,
            _ => FileType::Unknown,
        }
    }
}
