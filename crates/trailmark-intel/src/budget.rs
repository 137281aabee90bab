//! Tiered, token-budgeted selection of scored entries.

use serde::Serialize;
use std::cmp::Ordering;
use trailmark_core::clock::parse_ts;
use trailmark_core::types::ContextTypeTable;
use trailmark_core::{Entry, EntryType};

use crate::session::SessionInfo;

/// Relevance above which an untyped entry counts as current work.
const CURRENT_WORK_MIN_RELEVANCE: f64 = 0.7;
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    CriticalInsights,
    RecentMilestones,
    CurrentWork,
    Background,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::CriticalInsights,
        Tier::RecentMilestones,
        Tier::CurrentWork,
        Tier::Background,
    ];

    /// Hard cap on selected entries.
    pub fn cap(self) -> usize {
        match self {
            Tier::CriticalInsights => 5,
            Tier::RecentMilestones => 8,
            Tier::CurrentWork => 10,
            Tier::Background => 5,
        }
    }

    /// Share of the total budget, in percent.
    pub fn share_percent(self) -> usize {
        match self {
            Tier::CriticalInsights => 40,
            Tier::RecentMilestones => 30,
            Tier::CurrentWork => 25,
            Tier::Background => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::CriticalInsights => "Critical insights",
            Tier::RecentMilestones => "Recent milestones",
            Tier::CurrentWork => "Current work",
            Tier::Background => "Background",
        }
    }

    fn short_label(self) -> &'static str {
        match self {
            Tier::CriticalInsights => "critical",
            Tier::RecentMilestones => "milestones",
            Tier::CurrentWork => "current",
            Tier::Background => "background",
        }
    }

    /// First matching rule wins.
    pub fn assign(entry_type: EntryType, relevance: f64) -> Tier {
        match entry_type {
            EntryType::Insight | EntryType::Discovery | EntryType::Solution => {
                Tier::CriticalInsights
            }
            EntryType::Commit | EntryType::Feature | EntryType::BugFix => Tier::RecentMilestones,
            _ if relevance > CURRENT_WORK_MIN_RELEVANCE => Tier::CurrentWork,
            _ => Tier::Background,
        }
    }
}

/// Allocator input: an entry with its detected type and scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    pub entry: Entry,
    pub entry_type: EntryType,
    pub relevance: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestEntry {
    pub entry: Entry,
    pub entry_type: EntryType,
    pub relevance: f64,
    pub quality: f64,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub critical_insights: Vec<DigestEntry>,
    pub recent_milestones: Vec<DigestEntry>,
    pub current_work: Vec<DigestEntry>,
    pub background: Vec<DigestEntry>,
    pub summary: String,
    pub tokens_used: usize,
    /// Entries fetched, before any were skipped or merged.
    pub total_entries: usize,
    pub skipped_entries: usize,
    pub sessions: Vec<SessionInfo>,
}

impl Digest {
    pub fn tier(&self, tier: Tier) -> &[DigestEntry] {
        match tier {
            Tier::CriticalInsights => &self.critical_insights,
            Tier::RecentMilestones => &self.recent_milestones,
            Tier::CurrentWork => &self.current_work,
            Tier::Background => &self.background,
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut Vec<DigestEntry> {
        match tier {
            Tier::CriticalInsights => &mut self.critical_insights,
            Tier::RecentMilestones => &mut self.recent_milestones,
            Tier::CurrentWork => &mut self.current_work,
            Tier::Background => &mut self.background,
        }
    }

    pub fn selected_count(&self) -> usize {
        Tier::ALL.iter().map(|t| self.tier(*t).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_count() == 0
    }

    /// Selected entries across tiers, most important tier first.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &DigestEntry)> {
        Tier::ALL
            .into_iter()
            .flat_map(move |t| self.tier(t).iter().map(move |e| (t, e)))
    }
}

pub struct BudgetAllocator {
    max_token_budget: usize,
    table: ContextTypeTable,
}

impl BudgetAllocator {
    pub fn new(max_token_budget: usize, table: ContextTypeTable) -> Self {
        Self {
            max_token_budget,
            table,
        }
    }

    pub fn estimate_tokens(&self, entry_type: EntryType, description: &str) -> usize {
        let by_length = description.chars().count() / CHARS_PER_TOKEN;
        by_length.min(self.table.get(entry_type).max_tokens)
    }

    /// `floor(budget * share / 100)` without the intermediate product.
    fn tier_budget(&self, tier: Tier) -> usize {
        let pct = tier.share_percent();
        self.max_token_budget / 100 * pct + self.max_token_budget % 100 * pct / 100
    }

    pub fn allocate(&self, entries: Vec<ScoredEntry>) -> Digest {
        let total = entries.len();
        let mut digest = Digest {
            critical_insights: Vec::new(),
            recent_milestones: Vec::new(),
            current_work: Vec::new(),
            background: Vec::new(),
            summary: String::new(),
            tokens_used: 0,
            total_entries: total,
            skipped_entries: 0,
            sessions: Vec::new(),
        };
        if total == 0 {
            digest.summary = empty_summary();
            return digest;
        }

        let mut candidates: [Vec<ScoredEntry>; 4] = Default::default();
        for scored in entries {
            let tier = Tier::assign(scored.entry_type, scored.relevance);
            candidates[tier_index(tier)].push(scored);
        }

        let mut available = [0usize; 4];
        for tier in Tier::ALL {
            let mut pool = std::mem::take(&mut candidates[tier_index(tier)]);
            available[tier_index(tier)] = pool.len();
            pool.sort_by(rank);
            pool.truncate(tier.cap());

            let budget = self.tier_budget(tier);
            let mut used = 0usize;
            for scored in pool {
                let cost = self.estimate_tokens(scored.entry_type, &scored.entry.description);
                if used + cost > budget {
                    break;
                }
                used += cost;
                digest.tier_mut(tier).push(DigestEntry {
                    entry: scored.entry,
                    entry_type: scored.entry_type,
                    relevance: scored.relevance,
                    quality: scored.quality,
                    estimated_tokens: cost,
                });
            }
            digest.tokens_used += used;
        }

        digest.summary = self.summary(&digest, &available, total);
        digest
    }

    fn summary(&self, digest: &Digest, available: &[usize; 4], total: usize) -> String {
        let per_tier: Vec<String> = Tier::ALL
            .iter()
            .map(|t| {
                format!(
                    "{} {}/{}",
                    t.short_label(),
                    digest.tier(*t).len(),
                    available[tier_index(*t)]
                )
            })
            .collect();
        format!(
            "Selected {} of {} entries ({}); {}/{} tokens",
            digest.selected_count(),
            total,
            per_tier.join(", "),
            digest.tokens_used,
            self.max_token_budget
        )
    }
}

fn empty_summary() -> String {
    "No entries to summarize (0 entries)".to_string()
}

fn tier_index(tier: Tier) -> usize {
    match tier {
        Tier::CriticalInsights => 0,
        Tier::RecentMilestones => 1,
        Tier::CurrentWork => 2,
        Tier::Background => 3,
    }
}

/// Relevance desc, quality desc, newer first, then id.
fn rank(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.relevance
        .total_cmp(&a.relevance)
        .then_with(|| b.quality.total_cmp(&a.quality))
        .then_with(|| {
            match (parse_ts(&a.entry.ts), parse_ts(&b.entry.ts)) {
                (Some(x), Some(y)) => y.cmp(&x),
                _ => b.entry.ts.cmp(&a.entry.ts),
            }
        })
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}
