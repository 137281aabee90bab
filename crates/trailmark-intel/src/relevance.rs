//! Continuous relevance scoring: six clamped sub-scores blended by
//! configurable weights.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use time::OffsetDateTime;
use trailmark_core::clock::hours_between;
use trailmark_core::types::ContextTypeTable;
use trailmark_core::{Entry, EntryType, RelevanceWeights, WorkContext};

/// Days for the recency score to fall to 1/e.
const RECENCY_DECAY_DAYS: f64 = 10.0;

const HIGH_SIGNAL_TAGS: [&str; 4] = ["discovery", "diagnosis", "solution", "architecture"];
const TECH_PREFIX: &str = "tech-";

/// Keyword fallback for entries that carry neither a type tag nor a recorded type.
static TYPE_HINTS: LazyLock<Vec<(Regex, EntryType)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)\b(insight|learned|realized)\b").unwrap(), EntryType::Insight),
        (Regex::new(r"(?i)\b(discover(ed|y)|found)\b").unwrap(), EntryType::Discovery),
        (Regex::new(r"(?i)\b(solved|solution|resolved)\b").unwrap(), EntryType::Solution),
        (Regex::new(r"(?i)\b(architecture|design)\b").unwrap(), EntryType::Architecture),
        (Regex::new(r"(?i)\b(fix(ed)?|bug)\b").unwrap(), EntryType::BugFix),
        (Regex::new(r"(?i)\b(implement(ed)?|feature)\b").unwrap(), EntryType::Feature),
        (Regex::new(r"(?i)\bcommit(ted)?\b").unwrap(), EntryType::Commit),
        (Regex::new(r"(?i)\b(completed?|finished|done)\b").unwrap(), EntryType::Completion),
    ]
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub context_type: f64,
    pub hook_source: f64,
    pub rich_tags: f64,
    pub recency: f64,
    pub work_continuity: f64,
    pub uniqueness: f64,
    pub total: f64,
}

pub struct RelevanceScorer {
    weights: RelevanceWeights,
    table: ContextTypeTable,
    now: OffsetDateTime,
}

impl RelevanceScorer {
    pub fn new(weights: RelevanceWeights, table: ContextTypeTable, now: OffsetDateTime) -> Self {
        Self { weights, table, now }
    }

    pub fn score(&self, entry: &Entry, context: Option<&WorkContext>) -> f64 {
        self.breakdown(entry, context).total
    }

    pub fn breakdown(&self, entry: &Entry, context: Option<&WorkContext>) -> ScoreBreakdown {
        let detected = self.detect_type(entry);
        let context_type = clamp01(self.table.get(detected).base_weight);
        let hook_source = clamp01(hook_source_score(entry));
        let rich_tags = clamp01(rich_tag_score(entry));
        let recency = clamp01(self.recency(entry));
        let work_continuity = clamp01(continuity_score(entry, detected, context));
        let uniqueness = clamp01(uniqueness_score(entry.merged_count()));

        let w = &self.weights;
        let total = context_type * w.context_type
            + hook_source * w.hook_source
            + rich_tags * w.rich_tags
            + recency * w.recency
            + work_continuity * w.work_continuity
            + uniqueness * w.uniqueness;

        ScoreBreakdown {
            context_type,
            hook_source,
            rich_tags,
            recency,
            work_continuity,
            uniqueness,
            total: clamp01(total),
        }
    }

    /// Type used for scoring and tiering: explicit tag first, then the
    /// recorded/classified type, then keyword hints, then `General`.
    pub fn detect_type(&self, entry: &Entry) -> EntryType {
        if let Some(t) = self.table.strongest(entry.tag_types()) {
            return t;
        }
        if let Some(t) = entry.entry_type {
            return t;
        }
        TYPE_HINTS
            .iter()
            .find(|(re, _)| re.is_match(&entry.description))
            .map(|(_, t)| *t)
            .unwrap_or(EntryType::General)
    }

    fn recency(&self, entry: &Entry) -> f64 {
        match entry.timestamp() {
            Some(ts) => recency_score(hours_between(ts, self.now) / 24.0),
            None => 0.0,
        }
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Exponential decay; future timestamps count as brand new.
pub fn recency_score(days_since_entry: f64) -> f64 {
    (-days_since_entry.max(0.0) / RECENCY_DECAY_DAYS).exp()
}

/// Provenance ladder, independent of content.
fn hook_source_score(entry: &Entry) -> f64 {
    if entry.has_tag_type(EntryType::Insight) {
        1.0
    } else if entry.has_tag_type(EntryType::Commit) {
        0.9
    } else if entry.has_tag_type(EntryType::UserRequest) {
        0.7
    } else if entry.has_tag_type(EntryType::SessionStart) {
        0.3
    } else {
        0.5
    }
}

fn rich_tag_score(entry: &Entry) -> f64 {
    let mut structured: Vec<f64> = Vec::new();
    let mut tech = 0usize;
    let mut signal = 0usize;

    for tag in &entry.tags {
        let tag = tag.trim().to_ascii_lowercase();
        if let Some(n) = tag.strip_prefix("complexity-").and_then(|n| n.parse::<f64>().ok()) {
            structured.push(clamp01(n / 10.0));
        } else if let Some(n) = tag.strip_prefix("priority-").and_then(|n| n.parse::<f64>().ok()) {
            // priority-1 is the most urgent
            structured.push(clamp01((6.0 - n) / 5.0));
        } else if tag.len() > TECH_PREFIX.len() && tag.starts_with(TECH_PREFIX) {
            tech += 1;
        }
        if HIGH_SIGNAL_TAGS.contains(&tag.as_str()) {
            signal += 1;
        }
    }

    let structured_score = if structured.is_empty() {
        0.0
    } else {
        structured.iter().sum::<f64>() / structured.len() as f64
    };
    let signal_score = (signal as f64 / 2.0).min(1.0);
    let tech_score = (tech as f64 / 3.0).min(1.0);

    0.4 * structured_score + 0.4 * signal_score + 0.2 * tech_score
}

fn normalize_tech_tag(tag: &str) -> String {
    let tag = tag.trim().to_ascii_lowercase();
    if tag.starts_with(TECH_PREFIX) {
        tag
    } else {
        format!("{TECH_PREFIX}{tag}")
    }
}

fn continuity_score(entry: &Entry, detected: EntryType, context: Option<&WorkContext>) -> f64 {
    let Some(ctx) = context else {
        return 0.0;
    };
    let mut score = 0.0;

    if let (Some(active), Some(project)) = (ctx.project.as_deref(), entry.project.as_deref()) {
        if active.eq_ignore_ascii_case(project) {
            score += 0.5;
        }
    }

    if !ctx.tech_tags.is_empty() {
        let wanted: Vec<String> = ctx.tech_tags.iter().map(|t| normalize_tech_tag(t)).collect();
        let overlap = entry
            .tags
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| t.starts_with(TECH_PREFIX) && wanted.contains(t))
            .count();
        score += (overlap as f64 * 0.15).min(0.3);
    }

    if ctx.work_type == Some(detected) {
        score += 0.2;
    }

    score.min(1.0)
}

/// Consolidated entries are discounted but never to zero.
pub fn uniqueness_score(merged_count: usize) -> f64 {
    if merged_count <= 1 {
        1.0
    } else {
        (1.0 - (merged_count - 1) as f64 * 0.15).max(0.2)
    }
}
