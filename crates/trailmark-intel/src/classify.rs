//! Heuristic entry classification.
//!
//! An entry whose tags (or recorded type) already name a type keeps it with
//! high confidence; with several declared types the highest-priority one in
//! the context type table wins. Otherwise ordered pattern groups are scored against the
//! description and the best group wins; ties go to the group declared first,
//! so the outcome is deterministic for a given rule set.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use time::OffsetDateTime;
use trailmark_core::clock::hours_between;
use trailmark_core::{ContextTypeTable, Entry, EntryType};

const DECLARED_CONFIDENCE: f64 = 0.9;
const DEFAULT_CONFIDENCE: f64 = 0.6;
const NEGATIVE_MATCH_PENALTY: f64 = 0.2;

const SHORT_DESCRIPTION_CHARS: usize = 10;
const LONG_DESCRIPTION_CHARS: usize = 100;
const FILE_BONUS_PER_FILE: f64 = 0.02;
const FILE_BONUS_CAP: f64 = 0.10;
const WORD_BONUS_PER_WORD: f64 = 0.005;
const WORD_BONUS_CAP: f64 = 0.10;

const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 1.0;

/// One group of regex matchers voting for a single type.
#[derive(Debug, Clone)]
pub struct PatternGroup {
    pub entry_type: EntryType,
    pub patterns: Vec<Regex>,
    pub base_confidence: f64,
    pub negative_patterns: Vec<Regex>,
    pub suggested_tags: Vec<String>,
}

impl PatternGroup {
    /// Patterns are compiled case-insensitively.
    pub fn new(
        entry_type: EntryType,
        patterns: &[&str],
        base_confidence: f64,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            entry_type,
            patterns: compile_all(patterns)?,
            base_confidence,
            negative_patterns: Vec::new(),
            suggested_tags: Vec::new(),
        })
    }

    pub fn with_negative(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        self.negative_patterns = compile_all(patterns)?;
        Ok(self)
    }

    pub fn with_suggested_tags(mut self, tags: &[&str]) -> Self {
        self.suggested_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Normalized group score; 0 when nothing positive matched.
    fn score(&self, text: &str) -> (f64, usize) {
        if self.patterns.is_empty() {
            return (0.0, 0);
        }
        let positives = self.patterns.iter().filter(|p| p.is_match(text)).count();
        if positives == 0 {
            return (0.0, 0);
        }
        let negatives = self
            .negative_patterns
            .iter()
            .filter(|p| p.is_match(text))
            .count();
        let raw = positives as f64 * self.base_confidence
            - negatives as f64 * NEGATIVE_MATCH_PENALTY;
        (raw / (self.patterns.len() as f64).sqrt(), positives)
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")))
        .collect()
}

/// Immutable classifier policy.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub groups: Vec<PatternGroup>,
    pub critical_tags: BTreeSet<String>,
}

static DEFAULT_RULES: LazyLock<ClassifierRules> = LazyLock::new(|| ClassifierRules {
    groups: default_groups().unwrap(),
    critical_tags: ["critical", "breaking", "security", "urgent", "blocker", "important"]
        .iter()
        .map(|s| s.to_string())
        .collect(),
});

impl Default for ClassifierRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

fn default_groups() -> Result<Vec<PatternGroup>, regex::Error> {
    Ok(vec![
        PatternGroup::new(
            EntryType::Insight,
            &[
                r"\b(learned|realized|insight|turns out|key takeaway|til)\b",
                r"\b(understand(ing)? now|the (root )?cause (is|was))\b",
                r"\blessons?\b",
            ],
            0.85,
        )?
        .with_negative(&[r"\?\s*$"])?
        .with_suggested_tags(&["insight"]),
        PatternGroup::new(
            EntryType::Discovery,
            &[
                r"\b(discovered|found( out)?|noticed|uncovered|identified)\b",
                r"\b(diagnos(is|ed)|investigat(ed|ion))\b",
            ],
            0.8,
        )?
        .with_suggested_tags(&["discovery"]),
        PatternGroup::new(
            EntryType::Solution,
            &[
                r"\b(solved|resolved|workaround|solution|the fix (is|was))\b",
                r"\bby (switching|using|replacing|adding)\b",
            ],
            0.85,
        )?
        .with_suggested_tags(&["solution"]),
        PatternGroup::new(
            EntryType::Architecture,
            &[
                r"\b(architecture|designed|decided|decision|trade-?offs?)\b",
                r"\b(schema|interface|module boundar(y|ies)|data model)\b",
            ],
            0.75,
        )?
        .with_suggested_tags(&["architecture"]),
        PatternGroup::new(
            EntryType::BugFix,
            &[
                r"\b(fix(ed|es)?|bugs?|patch(ed)?|regression)\b",
                r"\b(crash(es|ed)?|errors?|failing|broken)\b",
            ],
            0.8,
        )?
        .with_negative(&[r"\b(todo|need to|should)\b"])?
        .with_suggested_tags(&["bug-fix"]),
        PatternGroup::new(
            EntryType::Feature,
            &[
                r"\b(add(ed|s)?|implement(ed|s)?|introduc(e|ed|es))\b",
                r"\b(feature|support for|endpoint|command)\b",
            ],
            0.75,
        )?
        .with_suggested_tags(&["feature"]),
        PatternGroup::new(
            EntryType::Commit,
            &[r"\b(commit(ted)?|merged|pushed)\b", r"\b[0-9a-f]{7,40}\b"],
            0.8,
        )?
        .with_suggested_tags(&["commit"]),
        PatternGroup::new(
            EntryType::Completion,
            &[
                r"\b(completed?|finished|done|shipped|wrapped up)\b",
                r"\ball tests pass(ing|ed)?\b",
            ],
            0.8,
        )?
        .with_negative(&[r"\bnot (yet )?(done|finished|complete)\b"])?
        .with_suggested_tags(&["completion"]),
        PatternGroup::new(
            EntryType::Refactor,
            &[r"\b(refactor(ed|ing)?|clean(ed)? up|renam(ed|ing)|extract(ed)?|simplif(y|ied))\b"],
            0.7,
        )?
        .with_suggested_tags(&["refactor"]),
        PatternGroup::new(
            EntryType::UserRequest,
            &[r"\b(user (asked|requested|wants)|requested|asked (me )?to)\b"],
            0.7,
        )?
        .with_suggested_tags(&["user-request"]),
        PatternGroup::new(
            EntryType::SessionStart,
            &[r"\b(session start(ed)?|starting (a )?(new )?session|resum(ed|ing) work)\b"],
            0.7,
        )?
        .with_suggested_tags(&["session-start"]),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub entry_type: EntryType,
    pub confidence_score: f64,
    pub reasoning_points: Vec<String>,
    pub suggested_tags: BTreeSet<String>,
}

/// Built once per pipeline invocation; `now` anchors the recency adjustment.
pub struct EntryClassifier {
    rules: ClassifierRules,
    table: ContextTypeTable,
    now: OffsetDateTime,
}

impl EntryClassifier {
    pub fn new(rules: ClassifierRules, now: OffsetDateTime) -> Self {
        Self {
            rules,
            table: ContextTypeTable::default(),
            now,
        }
    }

    /// Priority table used to pick among several declared types.
    pub fn with_table(mut self, table: ContextTypeTable) -> Self {
        self.table = table;
        self
    }

    pub fn classify(&self, entry: &Entry) -> ClassificationResult {
        let mut reasoning = Vec::new();

        let (entry_type, base) = match self.table.strongest(entry.declared_types()) {
            Some(declared) => {
                reasoning.push(format!("declared as {declared} by tag"));
                (declared, DECLARED_CONFIDENCE)
            }
            None => self.best_group(&entry.description, &mut reasoning),
        };

        let score = self.adjust(entry, base, &mut reasoning);
        let suggested_tags = self
            .rules
            .groups
            .iter()
            .find(|g| g.entry_type == entry_type)
            .map(|g| {
                g.suggested_tags
                    .iter()
                    .filter(|t| !entry.tags.contains(*t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        ClassificationResult {
            entry_type,
            confidence_score: score,
            reasoning_points: reasoning,
            suggested_tags,
        }
    }

    /// Classification confidence adjusted for type and description length.
    pub fn quality_score(&self, entry: &Entry, result: &ClassificationResult) -> f64 {
        let type_adjustment = match result.entry_type {
            EntryType::Completion => 0.1,
            EntryType::SessionStart => -0.1,
            _ => 0.0,
        };
        let word_bonus = (entry.word_count() as f64 * WORD_BONUS_PER_WORD).min(WORD_BONUS_CAP);
        (result.confidence_score + type_adjustment + word_bonus).clamp(0.0, 1.0)
    }

    pub fn get_quality_score(&self, entry: &Entry) -> f64 {
        let result = self.classify(entry);
        self.quality_score(entry, &result)
    }

    fn best_group(&self, text: &str, reasoning: &mut Vec<String>) -> (EntryType, f64) {
        let mut best: Option<(&PatternGroup, f64, usize)> = None;
        for group in &self.rules.groups {
            let (score, positives) = group.score(text);
            if score <= 0.0 {
                continue;
            }
            // Strict comparison: earlier groups win ties.
            if best.map_or(true, |(_, s, _)| score > s) {
                best = Some((group, score, positives));
            }
        }

        match best {
            Some((group, score, positives)) => {
                reasoning.push(format!(
                    "matched {positives}/{} {} patterns (score {score:.2})",
                    group.patterns.len(),
                    group.entry_type
                ));
                (group.entry_type, score)
            }
            None => {
                reasoning.push("no pattern matched; defaulting to general".to_string());
                (EntryType::General, DEFAULT_CONFIDENCE)
            }
        }
    }

    fn adjust(&self, entry: &Entry, base: f64, reasoning: &mut Vec<String>) -> f64 {
        let mut score = base;

        let len = entry.description.chars().count();
        if len < SHORT_DESCRIPTION_CHARS {
            score -= 0.2;
            reasoning.push(format!("short description ({len} chars) -0.20"));
        } else if len > LONG_DESCRIPTION_CHARS {
            score += 0.1;
            reasoning.push(format!("detailed description ({len} chars) +0.10"));
        }

        if entry.git_commit.as_deref().is_some_and(|c| !c.is_empty()) {
            score += 0.15;
            reasoning.push("commit context +0.15".to_string());
        } else if entry.git_branch.as_deref().is_some_and(|b| !b.is_empty()) {
            score += 0.10;
            reasoning.push("branch context +0.10".to_string());
        }

        if !entry.files.is_empty() {
            let bonus = (entry.files.len() as f64 * FILE_BONUS_PER_FILE).min(FILE_BONUS_CAP);
            score += bonus;
            reasoning.push(format!("{} files +{bonus:.2}", entry.files.len()));
        }

        if !entry.tags.is_empty() {
            score += 0.05;
            reasoning.push("tagged +0.05".to_string());
            if entry.tags.iter().any(|t| self.rules.critical_tags.contains(t)) {
                score += 0.10;
                reasoning.push("critical tag +0.10".to_string());
            }
        }

        if let Some(ts) = entry.timestamp() {
            let age_hours = hours_between(ts, self.now);
            if age_hours < 1.0 {
                score += 0.1;
                reasoning.push("recent (<1h) +0.10".to_string());
            } else if age_hours > 24.0 {
                score -= 0.05;
                reasoning.push("older than a day -0.05".to_string());
            }
        }

        score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmark_core::clock::parse_ts;
    use trailmark_core::ContextType;

    fn now() -> OffsetDateTime {
        parse_ts("2026-04-01T12:00:00Z").unwrap()
    }

    fn classifier() -> EntryClassifier {
        EntryClassifier::new(ClassifierRules::default(), now())
    }

    /// Five hours old: no recency adjustment either way.
    fn neutral(text: &str) -> Entry {
        Entry::new(text).with_id("e").at("2026-04-01T07:00:00Z")
    }

    #[test]
    fn completion_tag_gives_high_confidence() {
        let e = Entry::new("Finished token refresh rework")
            .at("2026-04-01T11:50:00Z")
            .with_tag("completion");
        let r = classifier().classify(&e);
        assert_eq!(r.entry_type, EntryType::Completion);
        assert!(r.confidence_score >= 0.85, "got {}", r.confidence_score);
        assert!(r.reasoning_points[0].contains("declared"));
    }

    #[test]
    fn declared_type_holds_even_when_old() {
        let e = Entry::new("Finished token refresh rework")
            .at("2026-03-01T00:00:00Z")
            .with_tag("completion");
        let r = classifier().classify(&e);
        assert!(r.confidence_score >= 0.85);
    }

    #[test]
    fn several_declared_types_resolve_by_table_priority() {
        let e = neutral("Wrapped up the exporter").with_tags(["completion", "commit"]);
        assert_eq!(classifier().classify(&e).entry_type, EntryType::Commit);

        let mut types = std::collections::BTreeMap::new();
        types.insert(EntryType::Commit, ContextType::new(3, 0.7, 80, "Commit"));
        types.insert(EntryType::Completion, ContextType::new(1, 1.0, 150, "Completion"));
        let c = classifier().with_table(ContextTypeTable::new(types));
        assert_eq!(c.classify(&e).entry_type, EntryType::Completion);
    }

    #[test]
    fn bug_fix_text_classified_by_patterns() {
        let r = classifier().classify(&neutral("Fixed auth bug in login flow"));
        assert_eq!(r.entry_type, EntryType::BugFix);
        assert!(r.suggested_tags.contains("bug-fix"));
    }

    #[test]
    fn unmatched_text_defaults_to_general() {
        let r = classifier().classify(&neutral("Looked around the codebase"));
        assert_eq!(r.entry_type, EntryType::General);
        assert!((r.confidence_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn negative_patterns_reduce_score() {
        let done = classifier().classify(&neutral("Finished the migration"));
        let not_done = classifier().classify(&neutral("Not finished with the migration"));
        assert_eq!(done.entry_type, EntryType::Completion);
        assert_eq!(not_done.entry_type, EntryType::Completion);
        assert!(not_done.confidence_score < done.confidence_score);
    }

    #[test]
    fn ties_go_to_first_declared_group() {
        let rules = ClassifierRules {
            groups: vec![
                PatternGroup::new(EntryType::Refactor, &[r"\bparser\b"], 0.7).unwrap(),
                PatternGroup::new(EntryType::Feature, &[r"\bparser\b"], 0.7).unwrap(),
            ],
            critical_tags: BTreeSet::new(),
        };
        let c = EntryClassifier::new(rules, now());
        assert_eq!(c.classify(&neutral("Touched the parser")).entry_type, EntryType::Refactor);
    }

    #[test]
    fn many_weak_patterns_are_normalized() {
        let rules = ClassifierRules {
            groups: vec![
                PatternGroup::new(EntryType::Feature, &[r"\bapi\b", r"\bxyz\b", r"\bqqq\b", r"\bzzz\b"], 0.9)
                    .unwrap(),
                PatternGroup::new(EntryType::Architecture, &[r"\bapi\b"], 0.6).unwrap(),
            ],
            critical_tags: BTreeSet::new(),
        };
        // Feature: 0.9 / sqrt(4) = 0.45; Architecture: 0.6 / 1 = 0.6.
        let c = EntryClassifier::new(rules, now());
        assert_eq!(c.classify(&neutral("Reworked the api layer")).entry_type, EntryType::Architecture);
    }

    #[test]
    fn commit_context_beats_branch_context() {
        let base = neutral("Looked around the codebase");
        let plain = classifier().classify(&base).confidence_score;
        let branch = classifier().classify(&base.clone().with_branch("main")).confidence_score;
        let commit = classifier()
            .classify(&base.with_branch("main").with_commit("abc1234"))
            .confidence_score;
        assert!((branch - plain - 0.10).abs() < 1e-9);
        assert!((commit - plain - 0.15).abs() < 1e-9);
    }

    #[test]
    fn file_bonus_is_capped() {
        let mut e = neutral("Looked around the codebase");
        for i in 0..20 {
            e = e.with_file(format!("src/f{i}.rs"));
        }
        let r = classifier().classify(&e);
        assert!((r.confidence_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn critical_tag_adds_extra_bonus() {
        let plain = classifier().classify(&neutral("Looked around the codebase").with_tag("notes"));
        let critical = classifier().classify(&neutral("Looked around the codebase").with_tag("security"));
        assert!((plain.confidence_score - 0.65).abs() < 1e-9);
        assert!((critical.confidence_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn confidence_stays_within_bounds() {
        let mut rich = Entry::new("Realized the root cause was the cache. ".repeat(5))
            .at("2026-04-01T11:59:00Z")
            .with_commit("abc1234")
            .with_tags(["insight", "critical"]);
        for i in 0..5 {
            rich = rich.with_file(format!("f{i}"));
        }
        let poor = Entry::new("hm").at("2025-01-01T00:00:00Z");
        let unparsed = Entry::new("").at("garbage");
        for e in [rich, poor, unparsed] {
            let r = classifier().classify(&e);
            assert!((0.1..=1.0).contains(&r.confidence_score), "{}", r.confidence_score);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let e = neutral("Discovered the deadlock while investigating CI").with_file("ci.yml");
        assert_eq!(classifier().classify(&e), classifier().classify(&e));
    }

    #[test]
    fn quality_score_rewards_completion_and_penalizes_session_start() {
        let c = classifier();
        let e = neutral("Wrapped up the import pipeline");
        let result = |entry_type| ClassificationResult {
            entry_type,
            confidence_score: 0.5,
            reasoning_points: Vec::new(),
            suggested_tags: BTreeSet::new(),
        };
        // 5 words: +0.025
        let q_done = c.quality_score(&e, &result(EntryType::Completion));
        let q_start = c.quality_score(&e, &result(EntryType::SessionStart));
        assert!((q_done - 0.625).abs() < 1e-9);
        assert!((q_start - 0.425).abs() < 1e-9);

        let tagged = e.with_tag("completion");
        assert!((0.0..=1.0).contains(&c.get_quality_score(&tagged)));
    }
}
