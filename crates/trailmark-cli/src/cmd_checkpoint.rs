use std::path::Path;
use tracing::debug;
use trailmark_core::{Entry, EntryType};

use crate::git;
use crate::workspace::Workspace;

pub struct CheckpointParams<'a> {
    pub repo_root: &'a Path,
    pub description: &'a str,
    pub tags: &'a [String],
    pub files: &'a [String],
    pub project: Option<&'a str>,
    pub session: Option<&'a str>,
    pub entry_type: Option<&'a str>,
    pub capture_git: bool,
}

pub fn execute(params: &CheckpointParams<'_>) -> anyhow::Result<()> {
    let entry = build_entry(params)?;
    let ws = Workspace::discover(params.repo_root);
    let store = ws.open_store()?;
    store.append_entry(&ws.id, &entry)?;
    debug!(id = %entry.id, workspace = %ws.id, "checkpoint recorded");

    let kind = entry
        .entry_type
        .map(|t| format!(" ({t})"))
        .unwrap_or_default();
    println!("Recorded {}{kind}", entry.id);
    Ok(())
}

fn build_entry(params: &CheckpointParams<'_>) -> anyhow::Result<Entry> {
    let description = params.description.trim();
    if description.is_empty() {
        anyhow::bail!("checkpoint description must not be empty");
    }

    let mut entry = Entry::new(description).with_tags(
        params
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty()),
    );
    for file in params.files {
        entry = entry.with_file(file.as_str());
    }
    if let Some(project) = params.project {
        entry = entry.with_project(project);
    }
    if let Some(session) = params.session {
        entry = entry.with_session(session);
    }
    if let Some(raw) = params.entry_type {
        let entry_type: EntryType = raw.parse().map_err(anyhow::Error::msg)?;
        entry = entry.with_type(entry_type);
    }
    if params.capture_git {
        if let Some(branch) = git::current_branch(params.repo_root) {
            entry = entry.with_branch(branch);
        }
        if let Some(commit) = git::head_commit(params.repo_root) {
            entry = entry.with_commit(commit);
        }
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(description: &'a str, tags: &'a [String]) -> CheckpointParams<'a> {
        CheckpointParams {
            repo_root: Path::new("."),
            description,
            tags,
            files: &[],
            project: Some("api"),
            session: None,
            entry_type: Some("bugfix"),
            capture_git: false,
        }
    }

    #[test]
    fn builds_entry_from_flags() {
        let tags = vec!["tech-rust".to_string(), "  ".to_string()];
        let entry = build_entry(&params("  Fixed the retry loop ", &tags)).unwrap();
        assert_eq!(entry.description, "Fixed the retry loop");
        assert_eq!(entry.tags.len(), 1);
        assert_eq!(entry.entry_type, Some(EntryType::BugFix));
        assert_eq!(entry.project.as_deref(), Some("api"));
        assert!(entry.git_branch.is_none());
    }

    #[test]
    fn rejects_blank_description_and_unknown_type() {
        assert!(build_entry(&params("   ", &[])).is_err());
        let mut p = params("ok", &[]);
        p.entry_type = Some("vibes");
        let err = build_entry(&p).unwrap_err();
        assert!(err.to_string().contains("unknown entry type"));
    }
}
