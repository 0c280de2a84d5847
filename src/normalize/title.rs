use crate::db::RawPosting;

/// Drop postings whose titles match both target-role search queries at once:
/// a data-science title that also reads as an analyst role, except the
/// unrelated video-analytics specialty.
fn is_ambiguous_role(lower: &str) -> bool {
    lower.contains("data scien")
        && (lower.contains("analyst") || lower.contains("аналитик"))
        && !lower.contains("видеоаналитика")
}

/// Drop systems-analyst postings the analyst search query over-matches,
/// unless the title names a target data role explicitly.
fn is_systems_analyst(lower: &str) -> bool {
    (lower.contains("систем") || lower.contains("system"))
        && !(lower.contains("data scientist")
            || lower.contains("аналитик данных")
            || lower.contains("дата аналитик"))
}

pub fn keep(title: &str) -> bool {
    let lower = title.to_lowercase();
    !is_ambiguous_role(&lower) && !is_systems_analyst(&lower)
}

/// Irreversible drop pass over a full batch, applied before any merging.
pub fn filter_titles(postings: Vec<RawPosting>) -> Vec<RawPosting> {
    postings.into_iter().filter(|p| keep(&p.title)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_titles_matching_both_queries() {
        assert!(!keep("Data Scientist / Analyst"));
        assert!(!keep("Senior Data Science Аналитик"));
    }

    #[test]
    fn keeps_plain_data_scientist() {
        assert!(keep("Data Scientist"));
        assert!(keep("Middle Data Scientist (NLP)"));
    }

    #[test]
    fn video_analytics_is_not_ambiguous() {
        assert!(keep("Data Science: видеоаналитика"));
    }

    #[test]
    fn drops_systems_analysts() {
        assert!(!keep("Системный аналитик"));
        assert!(!keep("System Analyst"));
    }

    #[test]
    fn keeps_systems_titles_naming_a_data_role() {
        assert!(keep("Аналитик данных (системы отчетности)"));
        assert!(keep("Data Scientist, recommender systems"));
    }
}
