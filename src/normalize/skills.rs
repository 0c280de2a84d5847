use itertools::Itertools;
use std::collections::BTreeSet;

/// Lowercase and collapse internal whitespace.
pub fn normalize_phrase(raw: &str) -> String {
    raw.to_lowercase().split_whitespace().join(" ")
}

/// A posting's structured tags as a normalized presence set.
pub fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| normalize_phrase(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Reconcile tag-derived and text-derived skills: plain set union, so either
/// side being empty leaves the other unchanged.
pub fn merge_skill_sets(
    from_tags: &BTreeSet<String>,
    from_text: &BTreeSet<String>,
) -> BTreeSet<String> {
    from_tags.union(from_text).cloned().collect()
}

/// Storage form: comma-joined in deterministic order.
pub fn join_skills(skills: &BTreeSet<String>) -> String {
    skills.iter().join(", ")
}
