//! Output generation: alert bodies and cluster summaries

pub mod formatter;
pub mod report;
