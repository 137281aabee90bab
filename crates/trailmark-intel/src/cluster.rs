//! Near-duplicate detection and consolidation.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use trailmark_core::clock::parse_ts;
use trailmark_core::{ConsolidationInfo, Entry, EntryId, TimeSpan};

use crate::similarity::entry_similarity;

const MERGED_ID_PREFIX: &str = "merged_";

/// Non-empty group of entries considered duplicates, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub members: Vec<Entry>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

pub struct SimilarityClusterer {
    threshold: f64,
}

impl SimilarityClusterer {
    /// `threshold` is expected in [0, 1]; the pipeline validates it.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Connected components of the "similarity exceeds threshold" graph.
    pub fn cluster(&self, entries: &[Entry]) -> Vec<Cluster> {
        let mut sets = DisjointSet::new(entries.len());
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                if entry_similarity(&entries[i], &entries[j]) > self.threshold {
                    sets.union(i, j);
                }
            }
        }

        // Clusters are ordered by their first member's input position.
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Cluster> = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let root = sets.find(i);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                clusters.push(Cluster {
                    members: Vec::new(),
                });
                clusters.len() - 1
            });
            clusters[slot].members.push(entry.clone());
        }
        clusters
    }

    /// Collapse a cluster into one entry. Singletons pass through unchanged.
    pub fn merge(&self, cluster: &Cluster) -> Entry {
        merge_members(&cluster.members)
    }

    pub fn consolidate(&self, entries: &[Entry]) -> Vec<Entry> {
        let clusters = self.cluster(entries);
        let merged = clusters.iter().filter(|c| !c.is_singleton()).count();
        debug!(
            input = entries.len(),
            clusters = clusters.len(),
            merged,
            "consolidated near-duplicates"
        );
        clusters.iter().map(|c| self.merge(c)).collect()
    }
}

fn merge_members(members: &[Entry]) -> Entry {
    match members {
        [] => Entry::new(""),
        [only] => only.clone(),
        _ => merge_many(members),
    }
}

fn merge_many(members: &[Entry]) -> Entry {
    // Longest description wins; earlier timestamp, then input order, break ties.
    let mut representative = &members[0];
    for candidate in &members[1..] {
        let by_len = candidate
            .description
            .chars()
            .count()
            .cmp(&representative.description.chars().count());
        if by_len == Ordering::Greater
            || (by_len == Ordering::Equal
                && compare_ts(&candidate.ts, &representative.ts) == Ordering::Less)
        {
            representative = candidate;
        }
    }

    let mut latest = &members[0];
    for candidate in &members[1..] {
        if compare_ts(&candidate.ts, &latest.ts) != Ordering::Less {
            latest = candidate;
        }
    }

    let mut merged_ids: Vec<EntryId> = Vec::new();
    let mut merged_entries = 0usize;
    let mut earliest = representative.ts.clone();
    let mut newest = latest.ts.clone();
    for member in members {
        let (ids, count, span) = match &member.consolidation {
            Some(info) => (
                info.merged_ids.clone(),
                info.merged_entries.max(1),
                info.time_span.clone(),
            ),
            None => (
                vec![member.id.clone()],
                1,
                TimeSpan {
                    earliest: member.ts.clone(),
                    latest: member.ts.clone(),
                },
            ),
        };
        merged_ids.extend(ids);
        merged_entries += count;
        if compare_ts(&span.earliest, &earliest) == Ordering::Less {
            earliest = span.earliest;
        }
        if compare_ts(&span.latest, &newest) == Ordering::Greater {
            newest = span.latest;
        }
    }

    let mut tags: BTreeSet<String> = BTreeSet::new();
    let mut files: Vec<String> = Vec::new();
    for member in members {
        tags.extend(member.tags.iter().cloned());
        for file in &member.files {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
    }

    let id = if representative.consolidation.is_some() {
        representative.id.clone()
    } else {
        format!("{MERGED_ID_PREFIX}{}", representative.id)
    };

    Entry {
        id,
        ts: latest.ts.clone(),
        description: representative.description.clone(),
        project: latest
            .project
            .clone()
            .or_else(|| members.iter().find_map(|m| m.project.clone())),
        git_branch: latest.git_branch.clone(),
        git_commit: latest.git_commit.clone(),
        tags,
        files,
        session_id: latest.session_id.clone(),
        entry_type: members.iter().filter_map(|m| m.entry_type).min(),
        confidence_score: members
            .iter()
            .filter_map(|m| m.confidence_score)
            .max_by(f64::total_cmp),
        consolidation: Some(ConsolidationInfo {
            merged_entries,
            merged_ids,
            time_span: TimeSpan {
                earliest,
                latest: newest,
            },
        }),
    }
}

/// Chronological order, falling back to string order for unparseable values.
fn compare_ts(a: &str, b: &str) -> Ordering {
    match (parse_ts(a), parse_ts(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Union-find with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller index as root.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmark_core::EntryType;

    fn auth_pair() -> Vec<Entry> {
        vec![
            Entry::new("Fixed authentication bug in login flow")
                .with_id("e1")
                .at("2026-04-10T09:00:00Z")
                .with_tag("bug-fix")
                .with_file("src/auth.rs")
                .with_branch("main"),
            Entry::new("Fixed authentication bug in the login flow")
                .with_id("e2")
                .at("2026-04-10T09:20:00Z")
                .with_tags(["bug-fix", "tech-rust"])
                .with_file("src/auth.rs")
                .with_file("src/session.rs")
                .with_branch("fix/auth"),
        ]
    }

    fn sample() -> Vec<Entry> {
        let mut entries = auth_pair();
        entries.insert(
            1,
            Entry::new("Designed the billing export schema")
                .with_id("e3")
                .at("2026-04-10T09:10:00Z"),
        );
        entries.push(
            Entry::new("Wrote release notes")
                .with_id("e4")
                .at("2026-04-10T10:00:00Z"),
        );
        entries
    }

    #[test]
    fn clusters_partition_input() {
        let entries = sample();
        let clusters = SimilarityClusterer::new(0.7).cluster(&entries);
        let mut seen: Vec<&str> = clusters
            .iter()
            .flat_map(|c| c.members.iter().map(|m| m.id.as_str()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["e1", "e2", "e3", "e4"]);
        assert!(clusters.iter().all(|c| !c.is_empty()));

        let ids: Vec<Vec<&str>> = clusters
            .iter()
            .map(|c| c.members.iter().map(|m| m.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["e1", "e2"], vec!["e3"], vec!["e4"]]);
    }

    #[test]
    fn near_identical_auth_entries_merge() {
        let clusterer = SimilarityClusterer::new(0.7);
        let out = clusterer.consolidate(&auth_pair());
        assert_eq!(out.len(), 1);

        let merged = &out[0];
        let info = merged.consolidation.as_ref().unwrap();
        assert_eq!(info.merged_entries, 2);
        assert_eq!(info.merged_ids, vec!["e1", "e2"]);
        assert_eq!(info.time_span.earliest, "2026-04-10T09:00:00Z");
        assert_eq!(info.time_span.latest, "2026-04-10T09:20:00Z");
        assert_eq!(merged.id, "merged_e2");
        assert_eq!(merged.description, "Fixed authentication bug in the login flow");
        assert_eq!(merged.ts, "2026-04-10T09:20:00Z");
        assert_eq!(merged.git_branch.as_deref(), Some("fix/auth"));
        assert!(merged.tags.contains("tech-rust"));
        assert_eq!(merged.files, vec!["src/auth.rs", "src/session.rs"]);
    }

    #[test]
    fn one_word_apart_descriptions_merge_at_default_threshold() {
        let entries = vec![
            Entry::new("Fixed auth bug in login flow")
                .with_id("a")
                .at("2026-04-10T09:00:00Z"),
            Entry::new("Fixed auth bug in the login flow")
                .with_id("b")
                .at("2026-04-10T09:05:00Z"),
        ];
        let merged = SimilarityClusterer::new(0.7).consolidate(&entries);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].description, "Fixed auth bug in the login flow");
        assert_eq!(merged[0].merged_count(), 2);
    }

    #[test]
    fn threshold_is_strict() {
        let a = Entry::new("a b c").with_id("a");
        let b = Entry::new("a b d").with_id("b");
        let entries = vec![a, b];
        assert_eq!(SimilarityClusterer::new(0.5).cluster(&entries).len(), 2);
        assert_eq!(SimilarityClusterer::new(0.49).cluster(&entries).len(), 1);
    }

    #[test]
    fn consolidation_is_idempotent() {
        let clusterer = SimilarityClusterer::new(0.7);
        let once = clusterer.consolidate(&sample());
        let twice = clusterer.consolidate(&once);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn merging_flattens_prior_consolidations() {
        let clusterer = SimilarityClusterer::new(0.7);
        let first = clusterer.consolidate(&auth_pair()).remove(0);
        let third = Entry::new("Fixed authentication bug in login flow")
            .with_id("e9")
            .at("2026-04-11T08:00:00Z")
            .with_tag("bug-fix");
        let merged = clusterer.merge(&Cluster {
            members: vec![first, third],
        });
        let info = merged.consolidation.unwrap();
        assert_eq!(info.merged_entries, 3);
        assert_eq!(info.merged_ids, vec!["e1", "e2", "e9"]);
        assert_eq!(info.time_span.latest, "2026-04-11T08:00:00Z");
        assert_eq!(merged.id, "merged_e2");
    }

    #[test]
    fn merged_type_is_the_strongest_member_type() {
        let members = vec![
            Entry::new("same text here").with_id("a").with_type(EntryType::Completion),
            Entry::new("same text here").with_id("b").with_type(EntryType::Insight),
        ];
        let merged = SimilarityClusterer::new(0.7).merge(&Cluster { members });
        assert_eq!(merged.entry_type, Some(EntryType::Insight));
        // equal length: the earlier member represents the cluster
        assert_eq!(merged.id, "merged_a");
    }

    #[test]
    fn singleton_passes_through() {
        let e = Entry::new("lonely").with_id("x");
        let out = SimilarityClusterer::new(0.7).consolidate(std::slice::from_ref(&e));
        assert_eq!(out, vec![e]);
    }
}
