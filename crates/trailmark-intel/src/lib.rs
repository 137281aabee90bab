//! The context intelligence pipeline: turns a fetched snapshot of checkpoints
//! into sessions, classifications, relevance scores, consolidated clusters and
//! finally a token-budgeted, tiered digest.

pub mod budget;
pub mod classify;
pub mod cluster;
pub mod pipeline;
pub mod relevance;
pub mod session;
pub mod similarity;

pub use budget::{BudgetAllocator, Digest, DigestEntry, ScoredEntry, Tier};
pub use classify::{ClassificationResult, ClassifierRules, EntryClassifier, PatternGroup};
pub use cluster::{Cluster, SimilarityClusterer};
pub use pipeline::{ContextPipeline, PipelineError};
pub use relevance::{RelevanceScorer, ScoreBreakdown};
pub use session::{SessionInfo, SessionSegmenter, SessionType};
