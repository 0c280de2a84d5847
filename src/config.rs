use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime settings, overridable through `VAC_*` environment variables
/// (e.g. `VAC_DB_PATH`, `VAC_MIN_SKILL_POSTINGS`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub api_base_url: String,
    pub lemma_url: String,
    pub rates_url: String,
    pub base_currency: String,
    /// A tag phrase must appear in more than this many postings to enter
    /// the vocabulary.
    pub min_skill_postings: usize,
    /// Hours added to the new batch's publication timestamps to line them
    /// up with the accumulated corpus.
    pub batch_offset_hours: i64,
    pub page_size: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .set_default("db_path", "data/vacancies.sqlite")?
            .set_default("api_base_url", "https://api.hh.ru")?
            .set_default("lemma_url", "http://localhost:8085/lemmatize")?
            .set_default("rates_url", "https://www.cbr-xml-daily.ru/daily_json.js")?
            .set_default("base_currency", "RUR")?
            .set_default("min_skill_postings", 10)?
            .set_default("batch_offset_hours", 3)?
            .set_default("page_size", 100)?
            .add_source(config::Environment::with_prefix("VAC"))
            .build()
            .context("Failed to build settings")?;
        cfg.try_deserialize().context("Failed to read settings")
    }
}
