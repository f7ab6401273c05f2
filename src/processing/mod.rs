//! Skill clustering pipeline

pub mod posting;
pub mod normalizer;
pub mod vectorizer;
pub mod cluster;
pub mod matcher;
pub mod pipeline;
