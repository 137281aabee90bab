use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Entry id format: `ckpt_<ulid>`
pub type EntryId = String;

/// Semantic type of a checkpoint.
///
/// Variants are declared from most to least important, and the derived `Ord`
/// follows that order, so the first element of a sorted set of types is the
/// strongest one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Insight,
    Discovery,
    Solution,
    Architecture,
    Commit,
    Feature,
    BugFix,
    Completion,
    Refactor,
    UserRequest,
    General,
    SessionStart,
}

impl EntryType {
    pub const ALL: [EntryType; 12] = [
        EntryType::Insight,
        EntryType::Discovery,
        EntryType::Solution,
        EntryType::Architecture,
        EntryType::Commit,
        EntryType::Feature,
        EntryType::BugFix,
        EntryType::Completion,
        EntryType::Refactor,
        EntryType::UserRequest,
        EntryType::General,
        EntryType::SessionStart,
    ];

    /// Canonical tag spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Insight => "insight",
            EntryType::Discovery => "discovery",
            EntryType::Solution => "solution",
            EntryType::Architecture => "architecture",
            EntryType::Commit => "commit",
            EntryType::Feature => "feature",
            EntryType::BugFix => "bug-fix",
            EntryType::Completion => "completion",
            EntryType::Refactor => "refactor",
            EntryType::UserRequest => "user-request",
            EntryType::General => "general",
            EntryType::SessionStart => "session-start",
        }
    }

    /// Map a raw tag string to a type. This is the only place tag spellings
    /// are interpreted; everything downstream works on the enum.
    pub fn from_tag(tag: &str) -> Option<EntryType> {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        let t = match normalized.as_str() {
            "insight" | "insights" | "learning" => EntryType::Insight,
            "discovery" | "finding" => EntryType::Discovery,
            "solution" | "resolved" => EntryType::Solution,
            "architecture" | "design" | "decision" => EntryType::Architecture,
            "commit" | "git-commit" => EntryType::Commit,
            "feature" | "feat" => EntryType::Feature,
            "bug-fix" | "bugfix" | "fix" | "bug" => EntryType::BugFix,
            "completion" | "completed" | "done" | "milestone" => EntryType::Completion,
            "refactor" | "refactoring" | "cleanup" => EntryType::Refactor,
            "user-request" | "request" | "user-prompt" => EntryType::UserRequest,
            "general" | "note" => EntryType::General,
            "session-start" | "session" | "startup" => EntryType::SessionStart,
            _ => return None,
        };
        Some(t)
    }

    /// Milestone-class work: entries that record something actually shipped or learned.
    pub fn is_milestone(self) -> bool {
        matches!(
            self,
            EntryType::Insight
                | EntryType::Discovery
                | EntryType::Solution
                | EntryType::Commit
                | EntryType::Feature
                | EntryType::BugFix
                | EntryType::Completion
        )
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::from_tag(s).ok_or_else(|| {
            let known: Vec<&str> = EntryType::ALL.iter().map(|t| t.as_str()).collect();
            format!("unknown entry type '{s}' (expected one of: {})", known.join(", "))
        })
    }
}

// ── Context type policy ──

/// Priority/weight policy for one entry type. Priority 1 is the most important.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextType {
    pub priority: u8,
    pub base_weight: f64,
    pub max_tokens: usize,
    pub label: String,
}

impl ContextType {
    pub fn new(priority: u8, base_weight: f64, max_tokens: usize, label: &str) -> Self {
        Self {
            priority,
            base_weight,
            max_tokens,
            label: label.to_string(),
        }
    }
}

/// Immutable `EntryType -> ContextType` table. Types missing from the map
/// resolve to the generic fallback (priority 4, weight 0.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTypeTable {
    types: BTreeMap<EntryType, ContextType>,
    fallback: ContextType,
}

impl ContextTypeTable {
    pub fn new(types: BTreeMap<EntryType, ContextType>) -> Self {
        Self {
            types,
            fallback: ContextType::new(4, 0.6, 60, "Note"),
        }
    }

    pub fn get(&self, entry_type: EntryType) -> &ContextType {
        self.types.get(&entry_type).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &ContextType {
        &self.fallback
    }

    /// Strongest type of a set, by table priority then declaration order.
    pub fn strongest<I>(&self, types: I) -> Option<EntryType>
    where
        I: IntoIterator<Item = EntryType>,
    {
        types
            .into_iter()
            .min_by_key(|t| (self.get(*t).priority, *t))
    }
}

impl Default for ContextTypeTable {
    fn default() -> Self {
        let types = BTreeMap::from([
            (EntryType::Insight, ContextType::new(1, 1.0, 150, "Insight")),
            (EntryType::Discovery, ContextType::new(1, 0.95, 150, "Discovery")),
            (EntryType::Solution, ContextType::new(1, 0.95, 150, "Solution")),
            (EntryType::Architecture, ContextType::new(2, 0.9, 120, "Architecture")),
            (EntryType::Commit, ContextType::new(2, 0.85, 100, "Commit")),
            (EntryType::Feature, ContextType::new(2, 0.85, 100, "Feature")),
            (EntryType::BugFix, ContextType::new(2, 0.85, 100, "Bug fix")),
            (EntryType::Completion, ContextType::new(3, 0.75, 80, "Completion")),
            (EntryType::Refactor, ContextType::new(3, 0.7, 80, "Refactor")),
            (EntryType::UserRequest, ContextType::new(3, 0.7, 80, "Request")),
            (EntryType::General, ContextType::new(4, 0.6, 60, "Note")),
            (EntryType::SessionStart, ContextType::new(5, 0.3, 40, "Session start")),
        ]);
        Self::new(types)
    }
}
