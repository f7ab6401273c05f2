//! The clustering pipeline: fetch, normalize, vectorize, cluster, persist, alert

use crate::error::{JobAlertError, Result};
use crate::input::source::PostingSource;
use crate::notify::alerts::{dispatch_alerts, DeliveryReport};
use crate::notify::mailer::Mailer;
use crate::output::formatter::DEFAULT_SUBJECT;
use crate::processing::cluster::{ClusterEngine, ClusterModel, Linkage};
use crate::processing::matcher::{match_postings, MatchResult, PreferenceMap};
use crate::processing::normalizer::SkillNormalizer;
use crate::processing::posting::{Posting, RawPosting};
use crate::processing::vectorizer::{TfidfVectorizer, VectorizerModel};
use crate::storage::model_store::ModelStore;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Knobs that are not part of a single run's request.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub linkage: Linkage,
    pub subject: String,
    /// Restrict alerts to postings absent from the previous dataset
    pub only_new_postings: bool,
    /// Write artifacts at the end of the run
    pub persist: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            linkage: Linkage::Ward,
            subject: DEFAULT_SUBJECT.to_string(),
            only_new_postings: false,
            persist: true,
        }
    }
}

/// Labeled postings together with the models that produced the labels.
#[derive(Debug, Clone)]
pub struct ClusteredBatch {
    pub postings: Vec<Posting>,
    pub vectorizer: VectorizerModel,
    pub cluster_model: ClusterModel,
    pub skipped: usize,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub keyword: String,
    pub fetched: usize,
    pub skipped: usize,
    pub clustered: usize,
    pub cluster_count: usize,
    pub vocabulary_size: usize,
    /// Postings not present in the previously stored dataset
    pub new_postings: usize,
    pub saved: bool,
    pub deliveries: DeliveryReport,
    pub processing_time_ms: u64,
}

/// Normalize, vectorize and cluster a batch of raw postings.
///
/// Records that cannot be turned into postings are skipped with a warning.
pub fn cluster_postings(raw: Vec<RawPosting>, cluster_count: usize, linkage: Linkage) -> Result<ClusteredBatch> {
    let normalizer = SkillNormalizer::new();
    let total = raw.len();

    let mut postings = Vec::with_capacity(total);
    for (position, record) in raw.into_iter().enumerate() {
        match normalizer.normalize_record(record) {
            Ok(posting) => postings.push(posting),
            Err(e) => warn!("Skipping posting #{}: {}", position + 1, e),
        }
    }
    let skipped = total - postings.len();

    if postings.is_empty() {
        return Err(JobAlertError::SourceUnavailable(format!(
            "none of the {} fetched records were usable",
            total
        )));
    }

    let corpus: Vec<&str> = postings.iter().map(|p| p.skill_text.as_str()).collect();
    let (matrix, vectorizer) = TfidfVectorizer::new().fit_transform(&corpus);
    info!(
        "Built {}x{} feature matrix",
        matrix.nrows(),
        matrix.ncols()
    );

    let (labels, cluster_model) = ClusterEngine::new(linkage).fit_predict(&matrix, cluster_count)?;
    for (posting, label) in postings.iter_mut().zip(labels) {
        posting.cluster = Some(label);
    }

    Ok(ClusteredBatch {
        postings,
        vectorizer,
        cluster_model,
        skipped,
    })
}

/// Drives one run against a posting source, a model store and a mailer.
pub struct Pipeline<S, M> {
    source: S,
    mailer: M,
    store: ModelStore,
    settings: PipelineSettings,
}

impl<S: PostingSource, M: Mailer> Pipeline<S, M> {
    pub fn new(source: S, mailer: M, store: ModelStore, settings: PipelineSettings) -> Self {
        Self {
            source,
            mailer,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Run the whole pipeline once.
    ///
    /// Any error before the save leaves the stored artifacts untouched.
    pub async fn run(
        &self,
        keyword: &str,
        page_count: usize,
        cluster_count: usize,
        preferences: &PreferenceMap,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let previous = self.previous_listings()?;

        info!("Fetching {} page(s) of postings for {:?}", page_count, keyword);
        let raw = self.source.fetch(keyword, page_count).await?;
        if raw.is_empty() {
            return Err(JobAlertError::SourceUnavailable(format!(
                "no postings found for {:?}",
                keyword
            )));
        }
        let fetched = raw.len();

        let batch = cluster_postings(raw, cluster_count, self.settings.linkage)?;

        let new_postings: Vec<&Posting> = batch
            .postings
            .iter()
            .filter(|p| !previous.contains(&owned_key(p)))
            .collect();
        info!(
            "{} of {} postings are new since the last run",
            new_postings.len(),
            batch.postings.len()
        );

        let saved = if self.settings.persist {
            self.store
                .save(&batch.postings, &batch.vectorizer, &batch.cluster_model)?;
            true
        } else {
            info!("Skipping artifact save");
            false
        };

        let matches: MatchResult<'_> = if self.settings.only_new_postings {
            match_postings(new_postings.iter().copied(), preferences)?
        } else {
            match_postings(&batch.postings, preferences)?
        };

        let deliveries = dispatch_alerts(&matches, &self.mailer, &self.settings.subject);
        if !deliveries.is_complete() {
            warn!(
                "{} of {} alerts failed",
                deliveries.failed.len(),
                deliveries.failed.len() + deliveries.delivered.len()
            );
        }

        Ok(RunReport {
            started_at,
            keyword: keyword.to_string(),
            fetched,
            skipped: batch.skipped,
            clustered: batch.postings.len(),
            cluster_count: batch.cluster_model.n_clusters,
            vocabulary_size: batch.vectorizer.vocabulary_size(),
            new_postings: new_postings.len(),
            saved,
            deliveries,
            processing_time_ms: timer.elapsed().as_millis() as u64,
        })
    }

    /// Listing keys of the previously stored dataset; empty on a first run.
    fn previous_listings(&self) -> Result<HashSet<(String, String, String)>> {
        match self.store.load() {
            Ok(previous) => {
                info!("Loaded {} postings from the previous run", previous.postings.len());
                Ok(previous.postings.iter().map(owned_key).collect())
            }
            Err(e) if e.is_not_found() => {
                info!("No previous artifacts in {}, treating this as a first run", self.store.root().display());
                Ok(HashSet::new())
            }
            Err(e) => Err(e),
        }
    }
}

fn owned_key(posting: &Posting) -> (String, String, String) {
    let (title, company, location) = posting.listing_key();
    (title.to_string(), company.to_string(), location.to_string())
}
