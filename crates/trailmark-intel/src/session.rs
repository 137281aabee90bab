//! Session segmentation: splits a checkpoint log into contiguous work periods.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use trailmark_core::clock::{format_ts, hours_between};
use trailmark_core::{Entry, EntryId, SessionConfig};

/// Sessions this short (in hours) with few entries count as quick restarts.
const QUICK_RESTART_MAX_HOURS: f64 = 0.5;
const QUICK_RESTART_MAX_ENTRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    Work,
    QuickRestart,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_start: String,
    /// `None` for the last session: it is still considered active.
    pub session_end: Option<String>,
    pub entry_count: usize,
    pub duration_hours: f64,
    pub session_type: SessionType,
    pub entry_ids: Vec<EntryId>,
}

impl SessionInfo {
    pub fn is_open(&self) -> bool {
        self.session_end.is_none()
    }
}

pub struct SessionSegmenter {
    config: SessionConfig,
}

impl SessionSegmenter {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Sessions with the noise filter applied. The last returned session is open.
    pub fn detect_sessions(&self, entries: &[Entry]) -> Vec<SessionInfo> {
        let min_entries = self.config.min_entries_for_session;
        let mut sessions: Vec<SessionInfo> = self
            .segment(entries)
            .into_iter()
            .filter(|s| s.entry_count >= min_entries)
            .collect();
        close_all_but_last(&mut sessions);
        sessions
    }

    /// Every parseable entry lands in exactly one session, in time order.
    pub fn segment(&self, entries: &[Entry]) -> Vec<SessionInfo> {
        let mut timed: Vec<(OffsetDateTime, &Entry)> = entries
            .iter()
            .filter_map(|e| match e.timestamp() {
                Some(ts) => Some((ts, e)),
                None => {
                    debug!(entry_id = %e.id, ts = %e.ts, "skipping entry with unparseable timestamp");
                    None
                }
            })
            .collect();
        // Stable: equal timestamps keep input order.
        timed.sort_by_key(|(ts, _)| *ts);

        let mut sessions = Vec::new();
        let mut current: Vec<(OffsetDateTime, &Entry)> = Vec::new();
        for item in timed {
            if let Some(prev) = current.last() {
                if self.is_boundary(prev, &item) {
                    sessions.push(self.build_session(&current));
                    current.clear();
                }
            }
            current.push(item);
        }
        if !current.is_empty() {
            sessions.push(self.build_session(&current));
        }

        close_all_but_last(&mut sessions);
        sessions
    }

    fn is_boundary(&self, prev: &(OffsetDateTime, &Entry), next: &(OffsetDateTime, &Entry)) -> bool {
        let (prev_ts, prev_entry) = prev;
        let (next_ts, next_entry) = next;
        let elapsed_hours = hours_between(*prev_ts, *next_ts);

        if elapsed_hours >= self.config.session_gap_hours {
            return true;
        }

        // Two markers seconds apart (duplicate hook firings) stay in one session.
        let is_marker = next_entry
            .declared_types()
            .iter()
            .any(|t| self.config.marker_types.contains(t));
        if is_marker && elapsed_hours * 60.0 >= self.config.quick_restart_minutes {
            return true;
        }

        matches!(
            (prev_entry.session_key(), next_entry.session_key()),
            (Some(a), Some(b)) if a != b
        )
    }

    fn build_session(&self, members: &[(OffsetDateTime, &Entry)]) -> SessionInfo {
        let first = members[0].0;
        let last = members[members.len() - 1].0;
        let duration_hours = hours_between(first, last);

        SessionInfo {
            session_start: format_ts(first),
            session_end: Some(format_ts(last)),
            entry_count: members.len(),
            duration_hours,
            session_type: self.session_type(members, duration_hours),
            entry_ids: members.iter().map(|(_, e)| e.id.clone()).collect(),
        }
    }

    fn session_type(&self, members: &[(OffsetDateTime, &Entry)], duration_hours: f64) -> SessionType {
        let has_milestone = members
            .iter()
            .any(|(_, e)| e.declared_types().iter().any(|t| t.is_milestone()));
        if members.len() <= QUICK_RESTART_MAX_ENTRIES
            && duration_hours < QUICK_RESTART_MAX_HOURS
            && !has_milestone
        {
            return SessionType::QuickRestart;
        }

        let markers: Vec<String> = self
            .config
            .continuation_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        let continues = members.iter().any(|(_, e)| {
            let text = e.description.to_lowercase();
            markers.iter().any(|m| text.contains(m.as_str()))
        });
        if continues {
            SessionType::Continuation
        } else {
            SessionType::Work
        }
    }
}

fn close_all_but_last(sessions: &mut [SessionInfo]) {
    if let Some(last) = sessions.last_mut() {
        last.session_end = None;
    }
}
