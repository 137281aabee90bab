use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::clock::parse_ts;
use crate::entry::Entry;

/// Time window of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Entries from the last `n` days.
    Days(u32),
    /// Inclusive RFC 3339 bounds; either side may be open.
    Range {
        from: Option<String>,
        to: Option<String>,
    },
    All,
}

/// Which workspaces a fetch may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceScope {
    Workspace(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub window: TimeWindow,
    pub query: Option<String>,
    pub project: Option<String>,
    pub workspace: WorkspaceScope,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            window: TimeWindow::Days(7),
            query: None,
            project: None,
            workspace: WorkspaceScope::All,
        }
    }
}

impl EntryFilter {
    pub fn last_days(days: u32) -> Self {
        Self {
            window: TimeWindow::Days(days),
            ..Default::default()
        }
    }

    /// Resolve the window to concrete bounds. Unparseable range bounds and
    /// day windows reaching past the representable past are treated as open.
    pub fn bounds(&self, now: OffsetDateTime) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        match &self.window {
            TimeWindow::Days(days) => (now.checked_sub(Duration::days(i64::from(*days))), None),
            TimeWindow::Range { from, to } => (
                from.as_deref().and_then(parse_ts),
                to.as_deref().and_then(parse_ts),
            ),
            TimeWindow::All => (None, None),
        }
    }

    /// In-memory equivalent of the store's query. Workspace scope is not
    /// checked here: an in-memory snapshot belongs to a single workspace.
    pub fn matches(&self, entry: &Entry, now: OffsetDateTime) -> bool {
        let (from, to) = self.bounds(now);
        if from.is_some() || to.is_some() {
            let Some(ts) = entry.timestamp() else {
                return false;
            };
            if from.is_some_and(|f| ts < f) || to.is_some_and(|t| ts > t) {
                return false;
            }
        }

        if let Some(project) = &self.project {
            if entry.project.as_deref() != Some(project.as_str()) {
                return false;
            }
        }

        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            let in_description = entry.description.to_lowercase().contains(&needle);
            let in_tags = entry.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !in_description && !in_tags {
                return false;
            }
        }

        true
    }
}

/// Anything that can hand the pipeline a snapshot of entries.
pub trait EntrySource {
    fn fetch_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<Entry>>;
}

impl EntrySource for [Entry] {
    fn fetch_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<Entry>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .iter()
            .filter(|e| filter.matches(e, now))
            .cloned()
            .collect())
    }
}

impl EntrySource for Vec<Entry> {
    fn fetch_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<Entry>> {
        self.as_slice().fetch_entries(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        parse_ts("2026-05-10T12:00:00Z").unwrap()
    }

    #[test]
    fn days_window_excludes_old_entries() {
        let filter = EntryFilter::last_days(2);
        let fresh = Entry::new("fresh").at("2026-05-09T12:00:00Z");
        let stale = Entry::new("stale").at("2026-05-01T12:00:00Z");
        assert!(filter.matches(&fresh, now()));
        assert!(!filter.matches(&stale, now()));
    }

    #[test]
    fn oversized_day_window_is_open_ended() {
        let filter = EntryFilter::last_days(u32::MAX);
        assert_eq!(filter.bounds(now()), (None, None));
        assert!(filter.matches(&Entry::new("old").at("1970-01-01T00:00:00Z"), now()));
    }

    #[test]
    fn range_window_is_inclusive() {
        let filter = EntryFilter {
            window: TimeWindow::Range {
                from: Some("2026-05-01T00:00:00Z".into()),
                to: Some("2026-05-02T00:00:00Z".into()),
            },
            ..Default::default()
        };
        assert!(filter.matches(&Entry::new("a").at("2026-05-01T00:00:00Z"), now()));
        assert!(filter.matches(&Entry::new("b").at("2026-05-02T00:00:00Z"), now()));
        assert!(!filter.matches(&Entry::new("c").at("2026-05-02T00:00:01Z"), now()));
    }

    #[test]
    fn unparseable_timestamp_only_passes_unbounded_window() {
        let bad = Entry::new("bad").at("not a time");
        assert!(!EntryFilter::last_days(7).matches(&bad, now()));
        let all = EntryFilter {
            window: TimeWindow::All,
            ..Default::default()
        };
        assert!(all.matches(&bad, now()));
    }

    #[test]
    fn query_matches_description_or_tags_case_insensitively() {
        let filter = EntryFilter {
            window: TimeWindow::All,
            query: Some("AUTH".into()),
            ..Default::default()
        };
        assert!(filter.matches(&Entry::new("fixed auth flow"), now()));
        assert!(filter.matches(&Entry::new("x").with_tag("tech-oauth"), now()));
        assert!(!filter.matches(&Entry::new("rendering"), now()));
    }

    #[test]
    fn project_filter_requires_exact_match() {
        let filter = EntryFilter {
            window: TimeWindow::All,
            project: Some("api".into()),
            ..Default::default()
        };
        assert!(filter.matches(&Entry::new("x").with_project("api"), now()));
        assert!(!filter.matches(&Entry::new("x").with_project("web"), now()));
        assert!(!filter.matches(&Entry::new("x"), now()));
    }

    #[test]
    fn vec_source_applies_filter() {
        let entries = vec![
            Entry::new("one").with_project("api"),
            Entry::new("two").with_project("web"),
        ];
        let filter = EntryFilter {
            window: TimeWindow::All,
            project: Some("web".into()),
            ..Default::default()
        };
        let got = entries.fetch_entries(&filter).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].description, "two");
    }
}
