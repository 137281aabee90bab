use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::clock::{now_rfc3339, parse_ts};
use crate::types::{EntryId, EntryType};

fn new_entry_id() -> EntryId {
    format!("ckpt_{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// Earliest/latest timestamps covered by a merged entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub earliest: String,
    pub latest: String,
}

/// Provenance of an entry produced by merging near-duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationInfo {
    pub merged_entries: usize,
    pub merged_ids: Vec<EntryId>,
    pub time_span: TimeSpan,
}

/// A single recorded checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub ts: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<ConsolidationInfo>,
}

impl Entry {
    /// New entry stamped with a fresh id and the current time.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_entry_id(),
            ts: now_rfc3339(),
            description: description.into(),
            project: None,
            git_branch: None,
            git_commit: None,
            tags: BTreeSet::new(),
            files: Vec::new(),
            session_id: None,
            entry_type: None,
            confidence_score: None,
            consolidation: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn at(mut self, ts: impl Into<String>) -> Self {
        self.ts = ts.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_branch = Some(branch.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.git_commit = Some(commit.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        parse_ts(&self.ts)
    }

    /// Types named by the entry's tags.
    pub fn tag_types(&self) -> BTreeSet<EntryType> {
        self.tags
            .iter()
            .filter_map(|t| EntryType::from_tag(t))
            .collect()
    }

    /// Tag types plus any type already recorded on the entry.
    pub fn declared_types(&self) -> BTreeSet<EntryType> {
        let mut types = self.tag_types();
        types.extend(self.entry_type);
        types
    }

    pub fn has_tag_type(&self, entry_type: EntryType) -> bool {
        self.tags
            .iter()
            .any(|t| EntryType::from_tag(t) == Some(entry_type))
    }

    /// Non-empty external session id, if any.
    pub fn session_key(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Number of original checkpoints this entry stands for.
    pub fn merged_count(&self) -> usize {
        self.consolidation
            .as_ref()
            .map(|c| c.merged_entries.max(1))
            .unwrap_or(1)
    }

    pub fn word_count(&self) -> usize {
        self.description.split_whitespace().count()
    }
}

/// What the caller is working on right now; feeds the work-continuity score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tech_tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<EntryType>,
}

impl WorkContext {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.tech_tags.is_empty() && self.work_type.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_has_prefixed_id_and_parseable_ts() {
        let e = Entry::new("Wired up the login form");
        assert!(e.id.starts_with("ckpt_"));
        assert!(e.timestamp().is_some());
        assert_eq!(e.merged_count(), 1);
    }

    #[test]
    fn declared_types_merge_tags_and_recorded_type() {
        let e = Entry::new("x")
            .with_tags(["commit", "tech-rust", "bugfix"])
            .with_type(EntryType::Completion);
        let types: Vec<EntryType> = e.declared_types().into_iter().collect();
        assert_eq!(
            types,
            vec![EntryType::Commit, EntryType::BugFix, EntryType::Completion]
        );
        assert!(e.has_tag_type(EntryType::BugFix));
        assert!(!e.has_tag_type(EntryType::Completion));
    }

    #[test]
    fn blank_session_id_is_not_a_key() {
        let e = Entry::new("x").with_session("   ");
        assert_eq!(e.session_key(), None);
        let e = Entry::new("x").with_session("abc");
        assert_eq!(e.session_key(), Some("abc"));
    }

    #[test]
    fn serde_skips_empty_optionals() {
        let e = Entry::new("hello").with_id("ckpt_1").at("2026-01-01T00:00:00Z");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], "ckpt_1");
        assert!(json.get("project").is_none());
        assert!(json.get("tags").is_none());
        let back: Entry = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }
}
