use std::collections::{BTreeSet, HashMap, HashSet};

use super::extract::MAX_PHRASE_TOKENS;

/// Umbrella terms that carry no signal for a corpus that is entirely about
/// analytics, plus brand-tool spellings that duplicate entries re-added via
/// `SYNONYMS`. Subtracted as a set difference; entries absent from the
/// counted corpus are simply ignored.
const STOPLIST: &[&str] = &[
    "",
    "анализ данных",
    "data analysis",
    "machine learning",
    "аналитика",
    "data science",
    "ml",
    "аналитические исследования",
    "машинное обучение",
    "работа с большим объемом информации",
    "it",
    "ms excel",
    "ms powerpoint",
    "ms power bi",
];

/// Canonical spellings for the brand tools whose prefixed variants sit in
/// the stoplist.
const SYNONYMS: &[&str] = &["excel", "powerpoint", "power bi"];

/// The run-scoped set of accepted skill phrases. Built once from the merged
/// corpus and frozen before extraction starts.
#[derive(Debug, Clone)]
pub struct SkillVocabulary {
    phrases: HashSet<String>,
}

impl SkillVocabulary {
    pub fn contains(&self, phrase: &str) -> bool {
        self.phrases.contains(phrase)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Fixture constructor for tests.
    #[cfg(test)]
    pub fn from_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SkillVocabulary {
            phrases: phrases.into_iter().map(Into::into).collect(),
        }
    }
}

/// Derive the vocabulary from every posting's normalized tag set.
///
/// Presence is what counts: a tag repeated inside one posting contributes
/// once. Phrases seen in more than `min_postings` postings survive, the
/// stoplist is subtracted, and the curated synonyms are unioned in.
pub fn build_vocabulary<'a, I>(tag_sets: I, min_postings: usize) -> SkillVocabulary
where
    I: IntoIterator<Item = &'a BTreeSet<String>>,
{
    let mut counts: HashMap<&'a str, usize> = HashMap::new();
    for set in tag_sets {
        for tag in set {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let stoplist: HashSet<&str> = STOPLIST.iter().copied().collect();
    let mut phrases: HashSet<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > min_postings)
        .map(|(phrase, _)| phrase)
        .filter(|p| is_valid_phrase(p))
        .filter(|p| !stoplist.contains(p))
        .map(str::to_string)
        .collect();

    for synonym in SYNONYMS {
        phrases.insert((*synonym).to_string());
    }

    SkillVocabulary { phrases }
}

/// 1-4 whitespace-separated tokens, alphabetic only.
fn is_valid_phrase(phrase: &str) -> bool {
    let mut tokens = 0;
    for token in phrase.split_whitespace() {
        tokens += 1;
        if tokens > MAX_PHRASE_TOKENS || !token.chars().all(char::is_alphabetic) {
            return false;
        }
    }
    tokens > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(data: Vec<Vec<&str>>) -> Vec<BTreeSet<String>> {
        data.into_iter()
            .map(|tags| tags.into_iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn phrases_below_threshold_are_excluded() {
        let tag_sets = sets(vec![
            vec!["sql", "python"],
            vec!["sql"],
            vec!["sql", "tableau"],
        ]);
        let vocab = build_vocabulary(tag_sets.iter(), 2);
        assert!(vocab.contains("sql"));
        assert!(!vocab.contains("python"));
        assert!(!vocab.contains("tableau"));
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        // Seen in exactly min_postings postings -> still out.
        let tag_sets = sets(vec![vec!["sql"]; 10]);
        let vocab = build_vocabulary(tag_sets.iter(), 10);
        assert!(!vocab.contains("sql"));
        let vocab = build_vocabulary(tag_sets.iter(), 9);
        assert!(vocab.contains("sql"));
    }

    #[test]
    fn stoplist_is_subtracted_even_when_frequent() {
        let tag_sets = sets(vec![vec!["data science", "sql"]; 20]);
        let vocab = build_vocabulary(tag_sets.iter(), 10);
        assert!(vocab.contains("sql"));
        assert!(!vocab.contains("data science"));
    }

    #[test]
    fn stoplist_entries_absent_from_corpus_are_a_noop() {
        let tag_sets = sets(vec![vec!["sql"]; 12]);
        let vocab = build_vocabulary(tag_sets.iter(), 10);
        assert!(vocab.contains("sql"));
        assert_eq!(vocab.len(), 1 + 3); // sql + synonyms
    }

    #[test]
    fn synonyms_are_always_present() {
        let vocab = build_vocabulary(std::iter::empty::<&BTreeSet<String>>(), 10);
        assert!(vocab.contains("excel"));
        assert!(vocab.contains("powerpoint"));
        assert!(vocab.contains("power bi"));
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn non_alphabetic_and_overlong_phrases_are_rejected() {
        let tag_sets = sets(vec![vec!["b2b", "one two three four five", "sql"]; 12]);
        let vocab = build_vocabulary(tag_sets.iter(), 10);
        assert!(vocab.contains("sql"));
        assert!(!vocab.contains("b2b"));
        assert!(!vocab.contains("one two three four five"));
    }
}
