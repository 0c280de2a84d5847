use std::collections::BTreeSet;

use super::vocab::SkillVocabulary;

/// Longest phrase the extractor will consider, in tokens.
pub const MAX_PHRASE_TOKENS: usize = 4;

/// Split free text into lowercase alphabetic tokens. Digits, punctuation and
/// markup leftovers all act as separators.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Mine a lemmatized description for vocabulary phrases.
///
/// Greedy longest-match-first, non-overlapping, left to right: at each
/// starting position the widest window (up to [`MAX_PHRASE_TOKENS`] tokens,
/// clamped to the end of the text) is probed first and shrunk one token at a
/// time; a match consumes its tokens, a single-token miss skips that token.
/// The result is a presence set, not a frequency count.
pub fn extract_skills(text: &str, vocab: &SkillVocabulary) -> BTreeSet<String> {
    scan(&tokenize(text), vocab)
}

/// The scan window over the token sequence. `stop` is exclusive and never
/// exceeds the token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    stop: usize,
}

impl Window {
    fn open_at(start: usize, len: usize) -> Window {
        Window {
            start,
            stop: (start + MAX_PHRASE_TOKENS).min(len),
        }
    }

    fn phrase(&self, tokens: &[String]) -> String {
        tokens[self.start..self.stop].join(" ")
    }

    fn is_single_token(&self) -> bool {
        self.stop.saturating_sub(self.start) <= 1
    }

    /// After a match: restart past the consumed tokens.
    fn past_match(&self, len: usize) -> Window {
        Window::open_at(self.stop, len)
    }

    fn shrunk(&self) -> Window {
        Window {
            start: self.start,
            stop: self.stop - 1,
        }
    }

    /// Single-token miss: skip the token, reopen at full width.
    fn past_skip(&self, len: usize) -> Window {
        Window::open_at(self.start + 1, len)
    }
}

fn scan(tokens: &[String], vocab: &SkillVocabulary) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let len = tokens.len();
    let mut window = Window::open_at(0, len);

    while window.start < len {
        let phrase = window.phrase(tokens);
        if vocab.contains(&phrase) {
            found.insert(phrase);
            window = window.past_match(len);
        } else if !window.is_single_token() {
            window = window.shrunk();
        } else {
            window = window.past_skip(len);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(phrases: &[&str]) -> SkillVocabulary {
        SkillVocabulary::from_phrases(phrases.iter().copied())
    }

    fn extracted(text: &str, phrases: &[&str]) -> Vec<String> {
        extract_skills(text, &vocab(phrases)).into_iter().collect()
    }

    #[test]
    fn tokenizer_is_lowercase_alphabetic() {
        assert_eq!(
            tokenize("Опыт работы: SQL, Python-3!"),
            vec!["опыт", "работы", "sql", "python"]
        );
        assert!(tokenize("42 1024").is_empty());
    }

    #[test]
    fn greedy_window_shrinks_to_shorter_matches() {
        // The worked example: 4-token window shrinks to the 2-token and
        // 1-token matches, silently skipping "engineer" and "developer".
        assert_eq!(
            extracted(
                "machine learning engineer python developer",
                &["machine learning", "python"]
            ),
            vec!["machine learning", "python"]
        );
    }

    #[test]
    fn longest_match_is_preferred() {
        assert_eq!(
            extracted("apache spark streaming pipeline", &["apache spark streaming", "apache spark", "spark"]),
            vec!["apache spark streaming"]
        );
    }

    #[test]
    fn matches_do_not_overlap() {
        // "power bi" consumes "bi"; the single "bi" entry cannot re-match it.
        assert_eq!(
            extracted("power bi dashboards", &["power bi", "bi"]),
            vec!["power bi"]
        );
    }

    #[test]
    fn repeated_matches_collapse_to_presence() {
        assert_eq!(extracted("sql and sql and sql", &["sql"]), vec!["sql"]);
    }

    #[test]
    fn match_at_end_of_short_text_is_found() {
        assert_eq!(extracted("знание sql", &["sql"]), vec!["sql"]);
        assert_eq!(extracted("sql", &["sql"]), vec!["sql"]);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(extracted("", &["sql"]).is_empty());
        assert!(extracted("plain text", &[]).is_empty());
    }

    #[test]
    fn rescanning_unmatched_residual_adds_nothing() {
        let v = vocab(&["machine learning", "python"]);
        let text = "machine learning engineer python developer";
        let first = extract_skills(text, &v);
        let residual: Vec<String> = tokenize(text)
            .into_iter()
            .filter(|t| !first.iter().any(|m| m.split(' ').any(|w| w == t)))
            .collect();
        let second = scan(&residual, &v);
        assert!(second.is_empty());
    }

    #[test]
    fn window_clamps_at_the_token_count() {
        let w = Window::open_at(3, 5);
        assert_eq!(w, Window { start: 3, stop: 5 });
        let w = Window::open_at(0, 2);
        assert_eq!(w, Window { start: 0, stop: 2 });
    }
}
