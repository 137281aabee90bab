use std::path::{Path, PathBuf};

use crate::HOME_ENV;

/// Hex characters kept from the blake3 digest of a repository path.
const WORKSPACE_ID_LEN: usize = 32;

/// Well-known paths under the store root.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub workspaces_dir: PathBuf,
}

impl StorePaths {
    /// Paths under an explicit root. Pure computation, no I/O.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            db_path: root.join("trailmark.db"),
            workspaces_dir: root.join("workspaces"),
            root,
        }
    }

    /// Paths under the per-user root: `$TRAILMARK_HOME`, else
    /// `<data dir>/trailmark`, else `~/.trailmark`.
    pub fn discover() -> Self {
        let root = std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("trailmark")))
            .or_else(|| dirs::home_dir().map(|h| h.join(".trailmark")))
            .unwrap_or_else(|| PathBuf::from(".trailmark"));
        Self::at(root)
    }

    /// Stable id of a repository: blake3 of its canonical path.
    pub fn workspace_id(repo_root: &Path) -> String {
        let canonical = repo_root
            .canonicalize()
            .unwrap_or_else(|_| repo_root.to_path_buf());
        let mut key = canonical.to_string_lossy().replace('\\', "/");
        if cfg!(windows) {
            key.make_ascii_lowercase();
        }
        let hex = blake3::hash(key.as_bytes()).to_hex();
        hex[..WORKSPACE_ID_LEN].to_string()
    }

    pub fn workspace_dir(&self, workspace: &str) -> PathBuf {
        self.workspaces_dir.join(workspace)
    }

    pub fn config_json(&self, workspace: &str) -> PathBuf {
        self.workspace_dir(workspace).join("config.json")
    }

    /// Workspace id and config path for a repo root.
    pub fn for_repo(&self, repo_root: &Path) -> (String, PathBuf) {
        let id = Self::workspace_id(repo_root);
        let config = self.config_json(&id);
        (id, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_root() {
        let paths = StorePaths::at("/data/trailmark");
        assert_eq!(paths.db_path, PathBuf::from("/data/trailmark/trailmark.db"));
        assert_eq!(
            paths.config_json("abc"),
            PathBuf::from("/data/trailmark/workspaces/abc/config.json")
        );
    }

    #[test]
    fn workspace_id_is_stable_hex() {
        let id = StorePaths::workspace_id(Path::new("/tmp/test-repo"));
        assert_eq!(id, StorePaths::workspace_id(Path::new("/tmp/test-repo")));
        assert_eq!(id.len(), WORKSPACE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, StorePaths::workspace_id(Path::new("/tmp/other-repo")));
    }

    #[test]
    fn discovered_root_is_not_empty() {
        assert!(!StorePaths::discover().root.as_os_str().is_empty());
    }

    #[test]
    fn for_repo_uses_workspace_id() {
        let paths = StorePaths::at("/data/trailmark");
        let (id, config) = paths.for_repo(Path::new("/tmp/some-repo"));
        assert_eq!(id, StorePaths::workspace_id(Path::new("/tmp/some-repo")));
        assert!(config.ends_with(format!("workspaces/{id}/config.json")));
    }
}
