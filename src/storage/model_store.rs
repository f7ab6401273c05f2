//! Durable storage for a run's labeled postings and fitted models
//!
//! A save writes three generation-named files and then swaps in
//! `manifest.json`, which is the only file a load trusts. Every file goes
//! through a temporary file in the same directory and an atomic rename, so a
//! crash at any point leaves the previously committed set loadable.
//!
//! Writers hold `.lock` for the whole save. Cleanup after a commit only
//! touches generations older than the one just committed.

use crate::error::{JobAlertError, Result};
use crate::processing::cluster::ClusterModel;
use crate::processing::posting::Posting;
use crate::processing::vectorizer::VectorizerModel;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

const MANIFEST_FILE: &str = "manifest.json";
const LOCK_FILE: &str = ".lock";
/// A lock untouched for this long belongs to a writer that died mid-save.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30 * 60);
const GENERATION_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";
const FORMAT_VERSION: u32 = 1;
const ARTIFACT_PREFIXES: [&str; 3] = ["dataset-", "vectorizer-", "cluster-model-"];

/// Everything one run persists.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub postings: Vec<Posting>,
    pub vectorizer: VectorizerModel,
    pub cluster_model: ClusterModel,
}

/// Index of the committed artifact files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: String,
    pub saved_at: DateTime<Utc>,
    pub posting_count: usize,
    pub cluster_count: usize,
    pub dataset: String,
    pub vectorizer: String,
    pub cluster_model: String,
}

pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a labeled dataset and its models, replacing any previous set.
    pub fn save(
        &self,
        postings: &[Posting],
        vectorizer: &VectorizerModel,
        cluster_model: &ClusterModel,
    ) -> Result<Manifest> {
        if postings.len() != cluster_model.n_samples {
            return Err(JobAlertError::InvalidInput(format!(
                "{} postings but the cluster model was fit on {}",
                postings.len(),
                cluster_model.n_samples
            )));
        }
        if postings.iter().any(|p| p.cluster.is_none()) {
            return Err(JobAlertError::InvalidInput(
                "refusing to save unlabeled postings".to_string(),
            ));
        }

        fs::create_dir_all(&self.root)?;
        let _lock = StoreLock::acquire(&self.root)?;

        let saved_at = Utc::now();
        let generation = self.next_generation(saved_at);
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation: generation.clone(),
            saved_at,
            posting_count: postings.len(),
            cluster_count: cluster_model.n_clusters,
            dataset: format!("dataset-{}.json", generation),
            vectorizer: format!("vectorizer-{}.json", generation),
            cluster_model: format!("cluster-model-{}.json", generation),
        };

        self.write_atomic(&manifest.dataset, &postings)?;
        self.write_atomic(&manifest.vectorizer, vectorizer)?;
        self.write_atomic(&manifest.cluster_model, cluster_model)?;
        self.write_atomic(MANIFEST_FILE, &manifest)?;

        info!(
            "Saved {} labeled postings to {} (generation {})",
            postings.len(),
            self.root.display(),
            generation
        );

        self.remove_stale(&manifest);
        Ok(manifest)
    }

    /// Load the last committed artifact set.
    pub fn load(&self) -> Result<ArtifactSet> {
        let manifest = self.manifest()?;

        let postings: Vec<Posting> = self.read_json(&manifest.dataset)?;
        let vectorizer: VectorizerModel = self.read_json(&manifest.vectorizer)?;
        let vectorizer = vectorizer
            .restore()
            .map_err(|e| JobAlertError::corrupt(self.root.join(&manifest.vectorizer), e))?;
        let cluster_model: ClusterModel = self.read_json(&manifest.cluster_model)?;

        let dataset_path = self.root.join(&manifest.dataset);
        if postings.len() != manifest.posting_count || postings.len() != cluster_model.n_samples {
            return Err(JobAlertError::corrupt(
                dataset_path,
                format!(
                    "dataset has {} postings, manifest says {}, cluster model says {}",
                    postings.len(),
                    manifest.posting_count,
                    cluster_model.n_samples
                ),
            ));
        }
        if let Some(index) = postings
            .iter()
            .position(|p| p.cluster.map_or(true, |c| c >= cluster_model.n_clusters))
        {
            return Err(JobAlertError::corrupt(
                dataset_path,
                format!("posting {} has no valid cluster label", index),
            ));
        }

        debug!("Loaded generation {} from {}", manifest.generation, self.root.display());
        Ok(ArtifactSet {
            postings,
            vectorizer,
            cluster_model,
        })
    }

    /// Read the manifest of the committed set.
    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.root.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(JobAlertError::ArtifactNotFound(self.root.clone()));
        }

        let manifest: Manifest = self.read_json(MANIFEST_FILE)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(JobAlertError::corrupt(
                path,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        Ok(manifest)
    }

    fn next_generation(&self, saved_at: DateTime<Utc>) -> String {
        let base = saved_at.format(GENERATION_FORMAT).to_string();
        let mut generation = base.clone();
        let mut attempt = 1;
        while ARTIFACT_PREFIXES
            .iter()
            .any(|prefix| self.root.join(format!("{}{}.json", prefix, generation)).exists())
        {
            generation = format!("{}-{}", base, attempt);
            attempt += 1;
        }
        generation
    }

    fn write_atomic<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let mut file = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(self.root.join(name)).map_err(|e| JobAlertError::Io(e.error))?;
        debug!("Wrote {}", name);
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.root.join(name);
        let content = fs::read_to_string(&path)
            .map_err(|e| JobAlertError::corrupt(&path, format!("unreadable: {}", e)))?;
        serde_json::from_str(&content).map_err(|e| JobAlertError::corrupt(&path, e))
    }

    /// Remove artifact files from generations older than the committed one.
    ///
    /// Newer or unrecognised generations may belong to a save that has not
    /// committed yet and are left alone.
    fn remove_stale(&self, manifest: &Manifest) {
        let committed = match generation_key(&manifest.generation) {
            Some(key) => key,
            None => {
                warn!("Unrecognised generation {}, skipping cleanup", manifest.generation);
                return;
            }
        };
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not scan {} for stale artifacts: {}", self.root.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let generation = ARTIFACT_PREFIXES
                .iter()
                .find_map(|prefix| name.strip_prefix(prefix))
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(generation_key);
            match generation {
                Some(key) if key < committed => {}
                _ => continue,
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!("Removed stale artifact {}", name),
                Err(e) => warn!("Could not remove stale artifact {}: {}", name, e),
            }
        }
    }
}

/// Sort key of a generation name: its timestamp, then its collision suffix.
fn generation_key(generation: &str) -> Option<(NaiveDateTime, u32)> {
    let (base, attempt) = match generation.split_once('-') {
        Some((base, attempt)) => (base, attempt.parse().ok()?),
        None => (generation, 0),
    };
    let timestamp = NaiveDateTime::parse_from_str(base, GENERATION_FORMAT).ok()?;
    Some((timestamp, attempt))
}

/// Exclusive write access to a store directory, released on drop.
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{} {}", std::process::id(), Utc::now().to_rfc3339())?;
                    debug!("Acquired {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !Self::is_stale(&path) {
                        break;
                    }
                    warn!("Removing abandoned lock {}", path.display());
                    if let Err(e) = fs::remove_file(&path) {
                        if e.kind() != ErrorKind::NotFound {
                            return Err(e.into());
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(JobAlertError::ArtifactLocked(path))
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map_or(false, |age| age > STALE_LOCK_AGE)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not release {}: {}", self.path.display(), e);
        }
    }
}
