use std::path::{Path, PathBuf};
use trailmark_core::PipelineConfig;
use trailmark_store::{load_pipeline_config, CheckpointStore, StorePaths};

/// The store location and identity of the repository the CLI runs in.
pub struct Workspace {
    pub id: String,
    pub paths: StorePaths,
    pub config_json: PathBuf,
}

impl Workspace {
    pub fn discover(repo_root: &Path) -> Self {
        Self::in_store(StorePaths::discover(), repo_root)
    }

    pub fn in_store(paths: StorePaths, repo_root: &Path) -> Self {
        let (id, config_json) = paths.for_repo(repo_root);
        Self {
            id,
            paths,
            config_json,
        }
    }

    pub fn open_store(&self) -> anyhow::Result<CheckpointStore> {
        CheckpointStore::open_or_create(&self.paths.db_path)
    }

    /// Pipeline defaults overlaid with this workspace's `config.json`.
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        load_pipeline_config(&self.config_json)
    }
}
