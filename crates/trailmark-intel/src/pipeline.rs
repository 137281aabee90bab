//! Orchestration: fetch once, then segment, classify, consolidate, score and
//! allocate.

use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use trailmark_core::types::ContextTypeTable;
use trailmark_core::{
    ConfigError, Entry, EntryFilter, EntryId, EntrySource, PipelineConfig, WorkContext,
};

use crate::budget::{BudgetAllocator, Digest, ScoredEntry};
use crate::classify::{ClassifierRules, EntryClassifier};
use crate::cluster::SimilarityClusterer;
use crate::relevance::RelevanceScorer;
use crate::session::SessionSegmenter;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to fetch entries")]
    Fetch(#[source] anyhow::Error),
}

pub struct ContextPipeline {
    config: PipelineConfig,
    table: ContextTypeTable,
    rules: ClassifierRules,
    now: Option<OffsetDateTime>,
}

impl ContextPipeline {
    /// Rejects invalid configuration up front.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            table: ContextTypeTable::default(),
            rules: ClassifierRules::default(),
            now: None,
        })
    }

    pub fn with_table(mut self, table: ContextTypeTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_rules(mut self, rules: ClassifierRules) -> Self {
        self.rules = rules;
        self
    }

    /// Pin the clock; otherwise each run uses the current time.
    pub fn with_now(mut self, now: OffsetDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn recall<S>(
        &self,
        source: &S,
        filter: &EntryFilter,
        context: Option<&WorkContext>,
    ) -> Result<Digest, PipelineError>
    where
        S: EntrySource + ?Sized,
    {
        let entries = source.fetch_entries(filter).map_err(PipelineError::Fetch)?;
        debug!(fetched = entries.len(), "fetched entries");
        Ok(self.run(entries, context))
    }

    /// Pure stage composition over an already fetched snapshot.
    pub fn run(&self, entries: Vec<Entry>, context: Option<&WorkContext>) -> Digest {
        let now = self.now.unwrap_or_else(OffsetDateTime::now_utc);
        let total = entries.len();

        // ── Drop malformed ──
        let mut valid = Vec::with_capacity(total);
        for entry in entries {
            if entry.description.trim().is_empty() {
                debug!(id = %entry.id, "skipping entry with empty description");
            } else if entry.timestamp().is_none() {
                debug!(id = %entry.id, ts = %entry.ts, "skipping entry with unparseable timestamp");
            } else {
                valid.push(entry);
            }
        }
        let skipped = total - valid.len();

        // ── Sessions ──
        let sessions = SessionSegmenter::new(&self.config.session).detect_sessions(&valid);

        // ── Classification ──
        let classifier =
            EntryClassifier::new(self.rules.clone(), now).with_table(self.table.clone());
        let mut quality: HashMap<EntryId, f64> = HashMap::with_capacity(valid.len());
        for entry in &mut valid {
            let result = classifier.classify(entry);
            quality.insert(entry.id.clone(), classifier.quality_score(entry, &result));
            entry.entry_type = Some(result.entry_type);
            entry.confidence_score = Some(result.confidence_score);
        }

        // ── Consolidation ──
        let consolidated =
            SimilarityClusterer::new(self.config.similarity_threshold).consolidate(&valid);

        // ── Scoring ──
        let scorer = RelevanceScorer::new(self.config.weights.clone(), self.table.clone(), now);
        let scored: Vec<ScoredEntry> = consolidated
            .into_iter()
            .map(|entry| {
                let entry_type = scorer.detect_type(&entry);
                let relevance = scorer.score(&entry, context);
                let quality = member_quality(&entry, &quality)
                    .unwrap_or_else(|| classifier.get_quality_score(&entry));
                ScoredEntry {
                    entry,
                    entry_type,
                    relevance,
                    quality,
                }
            })
            .collect();

        // ── Allocation ──
        let allocator = BudgetAllocator::new(self.config.token_budget(), self.table.clone());
        let mut digest = allocator.allocate(scored);
        digest.total_entries = total;
        digest.skipped_entries = skipped;
        digest.sessions = sessions;

        info!(
            total,
            skipped,
            selected = digest.selected_count(),
            tokens = digest.tokens_used,
            sessions = digest.sessions.len(),
            "context digest ready"
        );
        digest
    }
}

/// Best quality among the originals an entry stands for.
fn member_quality(entry: &Entry, quality: &HashMap<EntryId, f64>) -> Option<f64> {
    match &entry.consolidation {
        Some(info) => info
            .merged_ids
            .iter()
            .filter_map(|id| quality.get(id).copied())
            .max_by(f64::total_cmp),
        None => quality.get(&entry.id).copied(),
    }
}
