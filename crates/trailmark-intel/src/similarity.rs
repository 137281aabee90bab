//! Similarity primitives used by the clusterer.

use std::collections::BTreeSet;
use trailmark_core::Entry;

const TEXT_WEIGHT: f64 = 0.8;
const META_WEIGHT: f64 = 0.2;

/// Lowercased alphanumeric tokens of a text.
pub fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard index of two sets. Two empty sets share nothing.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokens(a), &tokens(b))
}

/// Description similarity, blended with metadata when both entries carry
/// comparable tags or projects.
pub fn entry_similarity(a: &Entry, b: &Entry) -> f64 {
    let text = text_similarity(&a.description, &b.description);

    let mut meta = Vec::with_capacity(2);
    if !a.tags.is_empty() && !b.tags.is_empty() {
        let ta: BTreeSet<String> = a.tags.iter().map(|t| t.to_lowercase()).collect();
        let tb: BTreeSet<String> = b.tags.iter().map(|t| t.to_lowercase()).collect();
        meta.push(jaccard(&ta, &tb));
    }
    if let (Some(pa), Some(pb)) = (a.project.as_deref(), b.project.as_deref()) {
        meta.push(if pa == pb { 1.0 } else { 0.0 });
    }

    if meta.is_empty() {
        text
    } else {
        let meta_score = meta.iter().sum::<f64>() / meta.len() as f64;
        TEXT_WEIGHT * text + META_WEIGHT * meta_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_split_on_punctuation_and_lowercase() {
        let got: Vec<String> = tokens("Fixed AUTH-bug, in login_flow!").into_iter().collect();
        assert_eq!(got, vec!["auth", "bug", "fixed", "flow", "in", "login"]);
    }

    #[test]
    fn jaccard_edge_cases() {
        let empty: BTreeSet<String> = BTreeSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert_eq!(text_similarity("same words", "Same WORDS"), 1.0);
        assert_eq!(text_similarity("alpha", "beta"), 0.0);
        assert!((text_similarity("a b c", "a b d") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn metadata_blends_only_when_both_sides_have_it() {
        let a = Entry::new("a b c").with_tag("bug-fix");
        let b = Entry::new("a b d");
        assert!((entry_similarity(&a, &b) - 0.5).abs() < 1e-9);

        let b = b.with_tag("bug-fix");
        // 0.8 * 0.5 + 0.2 * 1.0
        assert!((entry_similarity(&a, &b) - 0.6).abs() < 1e-9);

        let a = a.with_project("api");
        let b = b.with_project("web");
        // meta averages tags 1.0 and project 0.0
        assert!((entry_similarity(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = Entry::new("Fixed authentication bug in login flow").with_tags(["bug-fix", "auth"]);
        let b = Entry::new("Fixed the authentication bug").with_tag("bug-fix");
        assert_eq!(entry_similarity(&a, &b), entry_similarity(&b, &a));
    }
}
