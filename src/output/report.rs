//! Report structures describing clustered postings

use crate::processing::posting::Posting;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-cluster view of a labeled dataset, as shown after a run or by `inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub total_postings: usize,
    pub clusters: Vec<ClusterGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterGroup {
    pub label: usize,
    pub size: usize,

    /// Most frequent normalized skills in the cluster, most common first
    pub top_skills: Vec<String>,

    /// First postings of the cluster, in dataset order
    pub sample: Vec<PostingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRow {
    pub title: String,
    pub company: String,
    pub location: String,
}

impl From<&Posting> for PostingRow {
    fn from(posting: &Posting) -> Self {
        Self {
            title: posting.title.clone(),
            company: posting.company.clone(),
            location: posting.location.clone(),
        }
    }
}

impl ClusterSummary {
    /// Group labeled postings by cluster, keeping `top` sample rows per cluster.
    /// Postings without a label are left out.
    pub fn from_postings(postings: &[Posting], top: usize) -> Self {
        let mut grouped: BTreeMap<usize, Vec<&Posting>> = BTreeMap::new();
        for posting in postings {
            if let Some(label) = posting.cluster {
                grouped.entry(label).or_default().push(posting);
            }
        }

        let clusters = grouped
            .into_iter()
            .map(|(label, members)| ClusterGroup {
                label,
                size: members.len(),
                top_skills: top_skills(&members, 5),
                sample: members.iter().take(top).map(|p| PostingRow::from(*p)).collect(),
            })
            .collect();

        Self {
            total_postings: postings.len(),
            clusters,
        }
    }

    pub fn cluster_sizes(&self) -> Vec<(usize, usize)> {
        self.clusters.iter().map(|c| (c.label, c.size)).collect()
    }
}

fn top_skills(members: &[&Posting], limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for posting in members {
        for skill in &posting.normalized_skills {
            if !skill.is_empty() {
                *counts.entry(skill.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable sort keeps alphabetical order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(limit).map(|(skill, _)| skill.to_string()).collect()
}
