pub mod clock;
pub mod config;
pub mod entry;
pub mod filter;
pub mod types;

pub use config::{ConfigError, PipelineConfig, RelevanceWeights, SessionConfig};
pub use entry::{ConsolidationInfo, Entry, TimeSpan, WorkContext};
pub use filter::{EntryFilter, EntrySource, TimeWindow, WorkspaceScope};
pub use types::*;
