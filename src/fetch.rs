use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::{self, RawPosting};

const CONCURRENCY: usize = 10;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Page through the search endpoint and collect every posting id for a
/// query. Paging stops at the first empty page.
pub async fn search_ids(
    client: &reqwest::Client,
    base_url: &str,
    query: &str,
    page_size: usize,
) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    let mut page = 0usize;

    loop {
        let url = format!(
            "{base_url}/vacancies?text={query}&period=3&search_field=name&per_page={page_size}&page={page}"
        );
        let body: Value = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Failed to read search page {page}"))?;

        let items = body.get("items").and_then(Value::as_array);
        let Some(items) = items.filter(|items| !items.is_empty()) else {
            break;
        };
        for item in items {
            if let Some(id) = item.get("id").and_then(value_as_i64) {
                ids.push(id);
            }
        }
        page += 1;
    }

    info!(query, ids = ids.len(), "Collected posting ids");
    Ok(ids)
}

/// Fetch posting details concurrently, saving each record as it arrives.
pub async fn fetch_postings_streaming(
    conn: &Connection,
    client: &reqwest::Client,
    settings: &Settings,
    ids: Vec<i64>,
    query_label: &str,
) -> Result<FetchStats> {
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = ids.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send raw JSON, main loop parses and saves to DB
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(i64, Result<Value>)>(CONCURRENCY * 2);

    for id in ids {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let url = format!("{}/vacancies/{}", settings.api_base_url, id);

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let result = fetch_with_retry(&client, &url).await;
            let _ = tx.send((id, result)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut skipped = 0usize;
    let mut errors = 0usize;

    while let Some((id, result)) = rx.recv().await {
        match result {
            Ok(body) => match parse_posting(&body, query_label) {
                Some(posting) => {
                    db::insert_staging(conn, &posting)?;
                    ok += 1;
                }
                None => {
                    warn!(id, "Skipping malformed posting record");
                    skipped += 1;
                }
            },
            Err(e) => {
                warn!(id, error = %e, "Fetch failed");
                errors += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(FetchStats {
        total,
        ok,
        skipped,
        errors,
    })
}

async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Result<Value> {
    let mut backoff = BASE_BACKOFF_MS;
    let mut last_err = None;

    for attempt in 1..=MAX_RETRIES {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                if attempt < MAX_RETRIES {
                    warn!(url, attempt, error = %e, "Retrying after backoff");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    backoff *= 2;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap())
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<Value> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .with_context(|| format!("Failed to read posting {url}"))?;
    Ok(body)
}

/// Map one detail record onto a raw posting. `None` means a required field
/// is missing or unreadable; the caller logs and drops the record.
fn parse_posting(body: &Value, query_label: &str) -> Option<RawPosting> {
    let id = body.get("id").and_then(value_as_i64)?;
    let title = str_field(body, "name")?;
    let published_at = parse_published(body.get("published_at")?.as_str()?)?;
    let url = str_field(body, "alternate_url")?;
    let employer = nested_name(body.get("employer")?)?;
    let department = body.get("department").and_then(nested_name);
    let area = nested_name(body.get("area")?)?;
    let experience = nested_name(body.get("experience")?)?;
    let description = str_field(body, "description").map(|d| strip_html(&d))?;

    let tags = body
        .get("key_skills")
        .and_then(Value::as_array)
        .map(|skills| skills.iter().filter_map(nested_name).collect())
        .unwrap_or_default();

    let schedule = body.get("schedule").and_then(nested_name);
    let employment = body.get("employment").and_then(nested_name);

    let salary = body.get("salary").filter(|s| !s.is_null());
    let salary_from = salary.and_then(|s| s.get("from")).and_then(Value::as_f64);
    let salary_to = salary.and_then(|s| s.get("to")).and_then(Value::as_f64);
    let currency = salary
        .and_then(|s| s.get("currency"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(RawPosting {
        id,
        query_label: query_label.to_string(),
        title,
        published_at,
        url,
        employer,
        department,
        area,
        experience,
        tags,
        schedule,
        employment,
        description,
        salary_from,
        salary_to,
        currency,
    })
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)?.as_str().map(str::to_string)
}

fn nested_name(value: &Value) -> Option<String> {
    value.get("name")?.as_str().map(str::to_string)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// The source emits offsets without a colon ("+0300"), which RFC 3339
/// parsing rejects.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn strip_html(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    re.replace_all(text, "").into_owned()
}
