pub mod experience;
pub mod extract;
pub mod merge;
pub mod salary;
pub mod skills;
pub mod title;
pub mod vocab;

use anyhow::Result;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::db::{self, NormalizedPosting, RawPosting};
use crate::error::ProcessError;
use crate::rates::RateTable;
use self::vocab::SkillVocabulary;

pub struct PassLog {
    run_id: String,
    entries: Vec<PassEntry>,
}

struct PassEntry {
    pass_name: String,
    before: usize,
    after: usize,
}

impl PassLog {
    pub fn new(run_id: String) -> Self {
        PassLog {
            run_id,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, pass_name: &str, before: usize, after: usize) {
        println!(
            "  records after {}: {} (dropped {})",
            pass_name,
            after,
            before.saturating_sub(after)
        );
        self.entries.push(PassEntry {
            pass_name: pass_name.to_string(),
            before,
            after,
        });
    }

    pub fn persist(&self, conn: &Connection) -> Result<()> {
        for entry in &self.entries {
            db::insert_run_metric(conn, &self.run_id, &entry.pass_name, entry.before, entry.after)?;
        }
        Ok(())
    }
}

pub fn new_run_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("run-{}", now)
}

/// Populate every derived field for one posting. Pure function of its
/// inputs; the vocabulary and the rate snapshot are frozen before the first
/// call, which is what makes the fan-out below safe.
pub fn normalize_record(
    raw: RawPosting,
    skills_from_tags: BTreeSet<String>,
    description_lemmatized: String,
    vocab: &SkillVocabulary,
    rates: &RateTable,
    geo: &HashMap<String, (f64, f64)>,
    base_currency: &str,
) -> Result<NormalizedPosting, ProcessError> {
    let grade = experience::normalize_experience(&raw.experience);
    let skills_from_text = extract::extract_skills(&description_lemmatized, vocab);
    let combined = skills::merge_skill_sets(&skills_from_tags, &skills_from_text);
    let skills_joined = skills::join_skills(&combined);

    let salary_point = salary::point_estimate(raw.salary_from, raw.salary_to);
    let salary_base = salary::to_base_currency(
        salary_point,
        raw.currency.as_deref(),
        base_currency,
        rates,
    )?;
    let salary_bin = salary::bin(salary_base);

    let (lat, lon) = match geo.get(&raw.area) {
        Some((lat, lon)) => (Some(*lat), Some(*lon)),
        None => (None, None),
    };

    Ok(NormalizedPosting {
        raw,
        grade,
        description_lemmatized,
        skills_from_tags,
        skills_from_text,
        skills: skills_joined,
        salary_point,
        salary_base,
        salary_bin,
        lat,
        lon,
    })
}

pub type RecordInput = (RawPosting, BTreeSet<String>, String);

#[cfg(feature = "rayon")]
pub fn normalize_records(
    rows: Vec<RecordInput>,
    vocab: &SkillVocabulary,
    rates: &RateTable,
    geo: &HashMap<String, (f64, f64)>,
    base_currency: &str,
) -> Result<Vec<NormalizedPosting>, ProcessError> {
    rows.into_par_iter()
        .map(|(raw, tags, lemma)| {
            normalize_record(raw, tags, lemma, vocab, rates, geo, base_currency)
        })
        .collect()
}

#[cfg(not(feature = "rayon"))]
pub fn normalize_records(
    rows: Vec<RecordInput>,
    vocab: &SkillVocabulary,
    rates: &RateTable,
    geo: &HashMap<String, (f64, f64)>,
    base_currency: &str,
) -> Result<Vec<NormalizedPosting>, ProcessError> {
    rows.into_iter()
        .map(|(raw, tags, lemma)| {
            normalize_record(raw, tags, lemma, vocab, rates, geo, base_currency)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use super::experience::Grade;
    use super::salary::SalaryBin;

    fn raw() -> RawPosting {
        RawPosting {
            id: 1,
            query_label: "ds".into(),
            title: "Data Scientist".into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            url: "https://example.com/vacancies/1".into(),
            employer: "Acme".into(),
            department: None,
            area: "Москва".into(),
            experience: "От 1 года до 3 лет".into(),
            tags: vec!["SQL".into(), "Excel".into()],
            schedule: None,
            employment: None,
            description: "строить модели python".into(),
            salary_from: Some(100_000.0),
            salary_to: Some(200_000.0),
            currency: Some("RUR".into()),
        }
    }

    #[test]
    fn record_is_fully_populated_in_one_call() {
        let vocab = SkillVocabulary::from_phrases(["python"]);
        let rates = RateTable::from_rates([("USD", 90.0, 1.0)]);
        let mut geo = HashMap::new();
        geo.insert("Москва".to_string(), (55.75, 37.62));

        let posting = raw();
        let tags = skills::normalize_tags(&posting.tags);
        let normalized = normalize_record(
            posting,
            tags,
            "строить модель python".into(),
            &vocab,
            &rates,
            &geo,
            "RUR",
        )
        .unwrap();

        assert_eq!(normalized.grade, Grade::JuniorPlus);
        assert_eq!(normalized.skills, "excel, python, sql");
        assert_eq!(normalized.salary_point, Some(150_000.0));
        assert_eq!(normalized.salary_base, Some(150_000.0));
        assert_eq!(normalized.salary_bin, SalaryBin::From100kTo200k);
        assert_eq!(normalized.lat, Some(55.75));
        assert_eq!(normalized.lon, Some(37.62));
    }

    #[test]
    fn unknown_area_leaves_coordinates_unset() {
        let vocab = SkillVocabulary::from_phrases(["python"]);
        let rates = RateTable::from_rates([]);
        let normalized = normalize_record(
            raw(),
            BTreeSet::new(),
            "python".into(),
            &vocab,
            &rates,
            &HashMap::new(),
            "RUR",
        )
        .unwrap();
        assert_eq!(normalized.lat, None);
        assert_eq!(normalized.lon, None);
    }
}
