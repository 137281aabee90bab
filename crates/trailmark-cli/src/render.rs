//! Markdown rendering for digests, sessions and raw entries.

use trailmark_core::types::ContextTypeTable;
use trailmark_core::Entry;
use trailmark_intel::{Digest, DigestEntry, SessionInfo, SessionType, Tier};

const DESCRIPTION_PREVIEW: usize = 240;

pub fn render_digest(digest: &Digest, table: &ContextTypeTable, with_sessions: bool) -> String {
    let mut out = String::new();
    out.push_str("# trailmark recall\n\n");
    out.push_str(&format!("{}\n", digest.summary));
    if digest.skipped_entries > 0 {
        out.push_str(&format!(
            "\n_{} malformed entries skipped_\n",
            digest.skipped_entries
        ));
    }

    for tier in Tier::ALL {
        let entries = digest.tier(tier);
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {}\n\n", tier.label()));
        for item in entries {
            out.push_str(&render_digest_entry(item, table));
            out.push('\n');
        }
    }

    if with_sessions && !digest.sessions.is_empty() {
        out.push_str("\n## Sessions\n\n");
        out.push_str(&render_sessions(&digest.sessions));
    }
    out
}

fn render_digest_entry(item: &DigestEntry, table: &ContextTypeTable) -> String {
    let label = &table.get(item.entry_type).label;
    let mut line = format!(
        "- [{}] **{label}** {}",
        short_date(&item.entry.ts),
        truncate_str(&item.entry.description, DESCRIPTION_PREVIEW)
    );
    let tags = tag_list(&item.entry);
    if !tags.is_empty() {
        line.push_str(&format!("  {tags}"));
    }
    if let Some(info) = &item.entry.consolidation {
        line.push_str(&format!(
            " (merged {} checkpoints, {}..{})",
            info.merged_entries,
            short_date(&info.time_span.earliest),
            short_date(&info.time_span.latest)
        ));
    }
    line
}

pub fn render_sessions(sessions: &[SessionInfo]) -> String {
    let mut out = String::new();
    for s in sessions {
        let end = match &s.session_end {
            Some(end) => short_datetime(end),
            None => "now (open)".to_string(),
        };
        out.push_str(&format!(
            "- {} to {}: {} entries, {:.1}h, {}\n",
            short_datetime(&s.session_start),
            end,
            s.entry_count,
            s.duration_hours,
            session_type_label(s.session_type)
        ));
    }
    out
}

fn session_type_label(t: SessionType) -> &'static str {
    match t {
        SessionType::Work => "work",
        SessionType::QuickRestart => "quick restart",
        SessionType::Continuation => "continuation",
    }
}

/// One line per raw entry: `[2026-02-14 03:42] ckpt_01jk...  text  #tag1 #tag2`
pub fn render_entry_line(entry: &Entry) -> String {
    let mut line = format!(
        "[{}] {}  {}",
        short_datetime(&entry.ts),
        entry.id,
        truncate_str(&entry.description, 120)
    );
    let tags = tag_list(entry);
    if !tags.is_empty() {
        line.push_str(&format!("  {tags}"));
    }
    line
}

fn tag_list(entry: &Entry) -> String {
    entry
        .tags
        .iter()
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// "2026-02-14T03:42:00Z" -> "2026-02-14"
fn short_date(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}

/// "2026-02-14T03:42:00Z" -> "2026-02-14 03:42"
fn short_datetime(ts: &str) -> String {
    match (ts.get(..10), ts.get(11..16)) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        _ => ts.to_string(),
    }
}

pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.replace('\n', " ")
    } else {
        // Find the last char boundary at or before `max` bytes
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", s[..end].replace('\n', " "))
    }
}
