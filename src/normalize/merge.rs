use chrono::Duration;
use std::collections::HashMap;

use crate::db::RawPosting;

/// Fold a freshly fetched batch into the accumulated corpus.
///
/// The source reports publication times in its own timezone convention, so a
/// fixed offset is applied to the new batch only. An identifier is stable
/// across re-scrapes; when the same id shows up more than once, the
/// earliest-published record wins.
pub fn merge_batches(
    accumulated: Vec<RawPosting>,
    mut batch: Vec<RawPosting>,
    offset_hours: i64,
) -> Vec<RawPosting> {
    for posting in &mut batch {
        posting.published_at += Duration::hours(offset_hours);
    }

    let mut all = accumulated;
    all.extend(batch);
    all.sort_by(|a, b| (a.id, a.published_at).cmp(&(b.id, b.published_at)));

    let mut merged: Vec<RawPosting> = Vec::with_capacity(all.len());
    for posting in all {
        if merged.last().map(|p| p.id) != Some(posting.id) {
            merged.push(posting);
        }
    }
    merged
}

fn content_key(p: &RawPosting) -> (String, String, Option<String>, String, String) {
    (
        p.title.clone(),
        p.employer.clone(),
        p.department.clone(),
        p.area.clone(),
        p.description.clone(),
    )
}

/// Remove re-published duplicates: records that agree on title, employer,
/// department, area and description under different identifiers. Every copy
/// is dropped, none is kept as canonical.
pub fn drop_content_duplicates(postings: Vec<RawPosting>) -> Vec<RawPosting> {
    let mut counts: HashMap<(String, String, Option<String>, String, String), usize> =
        HashMap::new();
    for posting in &postings {
        *counts.entry(content_key(posting)).or_insert(0) += 1;
    }
    postings
        .into_iter()
        .filter(|p| counts[&content_key(p)] == 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn posting(id: i64, hour: u32, title: &str) -> RawPosting {
        RawPosting {
            id,
            query_label: "da".into(),
            title: title.into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            url: format!("https://example.com/vacancies/{id}"),
            employer: "Acme".into(),
            department: None,
            area: "Москва".into(),
            experience: "Нет опыта".into(),
            tags: vec![],
            schedule: None,
            employment: None,
            description: title.to_lowercase(),
            salary_from: None,
            salary_to: None,
            currency: None,
        }
    }

    #[test]
    fn earliest_record_wins_on_id_collision() {
        let old = vec![posting(42, 8, "Analyst")];
        let new = vec![posting(42, 10, "Analyst re-observed")];
        let merged = merge_batches(old, new, 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Analyst");
    }

    #[test]
    fn offset_applies_to_new_batch_only() {
        let old = vec![posting(1, 12, "Old")];
        let new = vec![posting(2, 12, "New")];
        let merged = merge_batches(old, new, 3);
        let old_ts = merged.iter().find(|p| p.id == 1).unwrap().published_at;
        let new_ts = merged.iter().find(|p| p.id == 2).unwrap().published_at;
        assert_eq!(old_ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(new_ts, Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn offset_is_applied_before_the_earliest_wins_comparison() {
        // New copy looks earlier on the wire, but the offset pushes it past the old one.
        let old = vec![posting(7, 11, "Kept")];
        let new = vec![posting(7, 9, "Dropped")];
        let merged = merge_batches(old, new, 3);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Kept");
        assert_eq!(
            merged[0].published_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn content_duplicates_are_all_dropped() {
        let mut a = posting(1, 8, "Analyst");
        let mut b = posting(2, 9, "Analyst");
        a.description = "same text".into();
        b.description = "same text".into();
        let c = posting(3, 10, "Different");
        let kept = drop_content_duplicates(vec![a, b, c]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 3);
    }
}
