pub mod config_file;
pub mod paths;
pub mod sqlite_store;

pub use config_file::{load_pipeline_config, parse_value, read_config, write_config};
pub use paths::StorePaths;
pub use sqlite_store::CheckpointStore;

use thiserror::Error;

/// Environment variable that overrides the store root.
pub const HOME_ENV: &str = "TRAILMARK_HOME";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown config key '{0}'")]
    UnknownConfigKey(String),

    #[error("invalid config: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    #[error("stored entry {id} has a corrupt {column} column")]
    CorruptEntry {
        id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
