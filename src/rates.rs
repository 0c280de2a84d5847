use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Legacy code still present on old postings; the daily table only carries
/// the current one.
const CURRENCY_ALIASES: &[(&str, &str)] = &[("BYR", "BYN")];

#[derive(Debug, Clone, Deserialize)]
pub struct Rate {
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Nominal")]
    pub nominal: f64,
}

/// Exchange-rate snapshot, valid only for the run's execution day. Fetched
/// once and passed into the salary stage as an immutable parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct RateTable {
    #[serde(rename = "Valute")]
    rates: HashMap<String, Rate>,
}

impl RateTable {
    /// Fixture constructor; (code, value, nominal) triples.
    #[cfg(test)]
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, f64, f64)>,
    {
        RateTable {
            rates: rates
                .into_iter()
                .map(|(code, value, nominal)| (code.to_string(), Rate { value, nominal }))
                .collect(),
        }
    }

    pub fn lookup(&self, code: &str) -> Option<&Rate> {
        let code = CURRENCY_ALIASES
            .iter()
            .find(|(legacy, _)| *legacy == code)
            .map(|(_, current)| *current)
            .unwrap_or(code);
        self.rates.get(code)
    }
}

pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<RateTable> {
    let table: RateTable = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("Failed to fetch exchange-rate snapshot")?;
    Ok(table)
}
