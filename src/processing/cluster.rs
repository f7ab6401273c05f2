//! Hierarchical agglomerative clustering of posting feature vectors
//!
//! Clusters are merged bottom-up until one remains; the recorded merge tree is
//! then cut to the requested number of clusters. With a fixed linkage and a
//! fixed row order the result is fully deterministic: ties are broken by the
//! lowest pair of slot indices.

use crate::error::{JobAlertError, Result};
use crate::processing::vectorizer::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Rule for measuring the distance between two clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum increase in within-cluster variance
    #[default]
    Ward,
    Complete,
    Average,
    Single,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Linkage::Ward => "ward",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Single => "single",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ward" => Ok(Linkage::Ward),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "single" => Ok(Linkage::Single),
            _ => Err(format!(
                "Invalid linkage: {}. Supported: ward, complete, average, single",
                s
            )),
        }
    }
}

/// One step of the merge tree.
///
/// Leaves are numbered `0..n`; the cluster created at step `s` is `n + s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// A fitted agglomerative clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    pub linkage: Linkage,
    pub n_clusters: usize,
    pub n_samples: usize,
    pub merges: Vec<Merge>,
}

pub struct ClusterEngine {
    linkage: Linkage,
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self::new(Linkage::default())
    }
}

impl ClusterEngine {
    pub fn new(linkage: Linkage) -> Self {
        Self { linkage }
    }

    /// Partition the rows of `matrix` into exactly `k` clusters.
    pub fn fit_predict(&self, matrix: &FeatureMatrix, k: usize) -> Result<(Vec<usize>, ClusterModel)> {
        let n = matrix.nrows();
        if k == 0 || k > n {
            return Err(JobAlertError::InvalidClusterCount {
                requested: k,
                postings: n,
            });
        }

        if matrix.ncols() == 0 && k > 1 {
            return Err(JobAlertError::InsufficientData {
                requested: k,
                available: 0,
            });
        }

        let distinct = count_distinct_rows(matrix);
        if distinct < k {
            return Err(JobAlertError::InsufficientData {
                requested: k,
                available: distinct,
            });
        }

        let merges = self.build_tree(matrix);
        let model = ClusterModel {
            linkage: self.linkage,
            n_clusters: k,
            n_samples: n,
            merges,
        };
        let labels = model.cut(k)?;

        log::info!(
            "Clustered {} postings into {} clusters ({} linkage)",
            n,
            k,
            self.linkage
        );
        Ok((labels, model))
    }

    /// Merge every row into a single cluster, recording each step.
    fn build_tree(&self, matrix: &FeatureMatrix) -> Vec<Merge> {
        let n = matrix.nrows();
        let mut distances = self.initial_distances(matrix);
        let mut active = vec![true; n];
        let mut sizes = vec![1usize; n];
        let mut node_ids: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for step in 0..n.saturating_sub(1) {
            let (i, j) = match closest_pair(&distances, &active) {
                Some(pair) => pair,
                None => break,
            };
            let d_ij = distances[i][j];
            let (n_i, n_j) = (sizes[i], sizes[j]);

            for other in 0..n {
                if !active[other] || other == i || other == j {
                    continue;
                }
                let updated = self.lance_williams(
                    distances[i][other],
                    distances[j][other],
                    d_ij,
                    n_i,
                    n_j,
                    sizes[other],
                );
                distances[i][other] = updated;
                distances[other][i] = updated;
            }

            let (left, right) = if node_ids[i] < node_ids[j] {
                (node_ids[i], node_ids[j])
            } else {
                (node_ids[j], node_ids[i])
            };
            merges.push(Merge {
                left,
                right,
                distance: self.height(d_ij),
                size: n_i + n_j,
            });
            log::debug!("Merge {}: {} + {} at {:.6}", step, left, right, self.height(d_ij));

            active[j] = false;
            sizes[i] = n_i + n_j;
            node_ids[i] = n + step;
        }

        merges
    }

    /// Pairwise distances between rows. Ward works on squared Euclidean
    /// distances so its Lance–Williams update stays linear.
    fn initial_distances(&self, matrix: &FeatureMatrix) -> Vec<Vec<f64>> {
        let n = matrix.nrows();
        let mut distances = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let squared: f64 = matrix
                    .row(i)
                    .iter()
                    .zip(matrix.row(j).iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let d = match self.linkage {
                    Linkage::Ward => squared,
                    _ => squared.sqrt(),
                };
                distances[i][j] = d;
                distances[j][i] = d;
            }
        }

        distances
    }

    /// Distance from `k` to the union of `i` and `j`.
    fn lance_williams(&self, d_ik: f64, d_jk: f64, d_ij: f64, n_i: usize, n_j: usize, n_k: usize) -> f64 {
        let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
        match self.linkage {
            Linkage::Ward => ((n_i + n_k) * d_ik + (n_j + n_k) * d_jk - n_k * d_ij) / (n_i + n_j + n_k),
            Linkage::Complete => d_ik.max(d_jk),
            Linkage::Single => d_ik.min(d_jk),
            Linkage::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
        }
    }

    fn height(&self, d: f64) -> f64 {
        match self.linkage {
            Linkage::Ward => d.max(0.0).sqrt(),
            _ => d,
        }
    }
}

impl ClusterModel {
    /// Flat labels obtained by stopping the agglomeration at `k` clusters.
    ///
    /// Labels are numbered in order of first appearance, so the first sample
    /// is always in cluster 0.
    pub fn cut(&self, k: usize) -> Result<Vec<usize>> {
        let n = self.n_samples;
        if k == 0 || k > n {
            return Err(JobAlertError::InvalidClusterCount {
                requested: k,
                postings: n,
            });
        }
        if self.merges.len() + 1 < n {
            return Err(JobAlertError::Processing(format!(
                "merge tree has {} steps for {} samples",
                self.merges.len(),
                n
            )));
        }

        // members[id] holds the samples of tree node `id` while it is a root
        let mut members: Vec<Vec<usize>> = (0..n).map(|sample| vec![sample]).collect();
        members.resize(n + self.merges.len(), Vec::new());

        for (step, merge) in self.merges.iter().take(n - k).enumerate() {
            let node = n + step;
            if merge.left >= node || merge.right >= node {
                return Err(JobAlertError::Processing(format!(
                    "merge {} references a node that does not exist yet",
                    step
                )));
            }
            let mut joined = std::mem::take(&mut members[merge.left]);
            joined.append(&mut members[merge.right]);
            members[node] = joined;
        }

        let mut root_of = vec![usize::MAX; n];
        for (root, samples) in members.iter().enumerate() {
            for &sample in samples {
                root_of[sample] = root;
            }
        }
        if root_of.contains(&usize::MAX) {
            return Err(JobAlertError::Processing(
                "merge tree lost track of a sample".to_string(),
            ));
        }

        let mut label_of_root: HashMap<usize, usize> = HashMap::new();
        let labels = root_of
            .iter()
            .map(|root| {
                let next = label_of_root.len();
                *label_of_root.entry(*root).or_insert(next)
            })
            .collect();

        Ok(labels)
    }

    /// Labels at the granularity the model was fit with.
    pub fn labels(&self) -> Result<Vec<usize>> {
        self.cut(self.n_clusters)
    }
}

fn closest_pair(distances: &[Vec<f64>], active: &[bool]) -> Option<(usize, usize)> {
    let n = active.len();
    let mut best: Option<(usize, usize, f64)> = None;

    for i in 0..n {
        if !active[i] {
            continue;
        }
        for j in (i + 1)..n {
            if !active[j] {
                continue;
            }
            let d = distances[i][j];
            match best {
                Some((_, _, current)) if d >= current => {}
                _ => best = Some((i, j, d)),
            }
        }
    }

    best.map(|(i, j, _)| (i, j))
}

fn count_distinct_rows(matrix: &FeatureMatrix) -> usize {
    matrix
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|w| w.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> FeatureMatrix {
        array![
            [0.0, 0.0],
            [10.0, 10.0],
            [0.1, 0.0],
            [10.0, 10.2],
            [0.0, 0.2],
            [5.0, -8.0],
            [5.1, -8.0],
        ]
    }

    #[test]
    fn test_separated_groups() {
        let engine = ClusterEngine::default();
        let (labels, model) = engine.fit_predict(&blobs(), 3).unwrap();

        assert_eq!(labels, vec![0, 1, 0, 1, 0, 2, 2]);
        assert_eq!(model.n_clusters, 3);
        assert_eq!(model.merges.len(), 6);
    }

    #[test]
    fn test_every_linkage_finds_the_groups() {
        for linkage in [Linkage::Ward, Linkage::Complete, Linkage::Average, Linkage::Single] {
            let (labels, _) = ClusterEngine::new(linkage).fit_predict(&blobs(), 3).unwrap();
            assert_eq!(labels, vec![0, 1, 0, 1, 0, 2, 2], "linkage {}", linkage);
        }
    }

    #[test]
    fn test_repeated_fits_agree() {
        let engine = ClusterEngine::new(Linkage::Ward);
        let (first, first_model) = engine.fit_predict(&blobs(), 4).unwrap();
        let (second, second_model) = engine.fit_predict(&blobs(), 4).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_model, second_model);
    }

    #[test]
    fn test_distinct_label_count_matches_k() {
        let engine = ClusterEngine::default();
        for k in 1..=7 {
            let (labels, _) = engine.fit_predict(&blobs(), k).unwrap();
            let distinct: HashSet<usize> = labels.iter().copied().collect();
            assert_eq!(distinct.len(), k);
            assert!(labels.iter().all(|&label| label < k));
        }
    }

    #[test]
    fn test_invalid_cluster_counts() {
        let engine = ClusterEngine::default();

        let too_many = engine.fit_predict(&blobs(), 8);
        assert!(matches!(
            too_many,
            Err(JobAlertError::InvalidClusterCount { requested: 8, postings: 7 })
        ));

        let zero = engine.fit_predict(&blobs(), 0);
        assert!(matches!(zero, Err(JobAlertError::InvalidClusterCount { .. })));
    }

    #[test]
    fn test_featureless_matrix() {
        let engine = ClusterEngine::default();
        let empty = FeatureMatrix::zeros((4, 0));

        let (labels, _) = engine.fit_predict(&empty, 1).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0]);

        let result = engine.fit_predict(&empty, 2);
        assert!(matches!(result, Err(JobAlertError::InsufficientData { available: 0, .. })));
    }

    #[test]
    fn test_duplicate_rows_limit_cluster_count() {
        let engine = ClusterEngine::default();
        let matrix = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]];

        let (labels, _) = engine.fit_predict(&matrix, 2).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 0]);

        let result = engine.fit_predict(&matrix, 3);
        assert!(matches!(
            result,
            Err(JobAlertError::InsufficientData { requested: 3, available: 2 })
        ));
    }

    #[test]
    fn test_ward_heights_are_monotone() {
        let (_, model) = ClusterEngine::default().fit_predict(&blobs(), 2).unwrap();
        assert!(model
            .merges
            .windows(2)
            .all(|pair| pair[0].distance <= pair[1].distance));
        assert_eq!(model.merges.last().unwrap().size, 7);
    }

    #[test]
    fn test_cut_at_other_granularity() {
        let (_, model) = ClusterEngine::default().fit_predict(&blobs(), 3).unwrap();

        assert_eq!(model.cut(1).unwrap(), vec![0; 7]);
        assert_eq!(model.cut(7).unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(model.labels().unwrap(), vec![0, 1, 0, 1, 0, 2, 2]);
        assert!(model.cut(8).is_err());
    }

    #[test]
    fn test_linkage_parsing() {
        assert_eq!("Ward".parse::<Linkage>().unwrap(), Linkage::Ward);
        assert_eq!("average".parse::<Linkage>().unwrap(), Linkage::Average);
        assert!("centroid".parse::<Linkage>().is_err());
        assert_eq!(Linkage::Complete.to_string(), "complete");
    }
}
