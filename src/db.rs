use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::warn;

use crate::normalize::experience::Grade;
use crate::normalize::salary::SalaryBin;
use crate::normalize::skills::join_skills;

/// One raw posting as fetched from the source API, before normalization.
#[derive(Debug, Clone)]
pub struct RawPosting {
    pub id: i64,
    pub query_label: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub employer: String,
    pub department: Option<String>,
    pub area: String,
    pub experience: String,
    pub tags: Vec<String>,
    pub schedule: Option<String>,
    pub employment: Option<String>,
    pub description: String,
    pub salary_from: Option<f64>,
    pub salary_to: Option<f64>,
    pub currency: Option<String>,
}

/// A posting with every derived field populated. Built once per run and
/// written out in full; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct NormalizedPosting {
    pub raw: RawPosting,
    pub grade: Grade,
    pub description_lemmatized: String,
    pub skills_from_tags: std::collections::BTreeSet<String>,
    pub skills_from_text: std::collections::BTreeSet<String>,
    pub skills: String,
    pub salary_point: Option<f64>,
    pub salary_base: Option<f64>,
    pub salary_bin: SalaryBin,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Slim row for the stats command.
#[derive(Debug, Clone)]
pub struct StatsRow {
    pub query_label: String,
    pub grade: String,
    pub area: String,
    pub salary_base: Option<f64>,
    pub skills: String,
}

pub fn connect(path: &str) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open database {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS postings_staging (
            id           INTEGER NOT NULL,
            query_label  TEXT NOT NULL,
            title        TEXT NOT NULL,
            published_at TEXT NOT NULL,
            url          TEXT NOT NULL,
            employer     TEXT NOT NULL,
            department   TEXT,
            area         TEXT NOT NULL,
            experience   TEXT NOT NULL,
            tags         TEXT NOT NULL,
            schedule     TEXT,
            employment   TEXT,
            description  TEXT NOT NULL,
            salary_from  REAL,
            salary_to    REAL,
            currency     TEXT,
            fetched_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (id, query_label)
        );

        CREATE TABLE IF NOT EXISTS postings_raw (
            id           INTEGER PRIMARY KEY,
            query_label  TEXT NOT NULL,
            title        TEXT NOT NULL,
            published_at TEXT NOT NULL,
            url          TEXT NOT NULL,
            employer     TEXT NOT NULL,
            department   TEXT,
            area         TEXT NOT NULL,
            experience   TEXT NOT NULL,
            tags         TEXT NOT NULL,
            schedule     TEXT,
            employment   TEXT,
            description  TEXT NOT NULL,
            salary_from  REAL,
            salary_to    REAL,
            currency     TEXT
        );

        CREATE TABLE IF NOT EXISTS postings (
            id                     INTEGER PRIMARY KEY,
            query_label            TEXT NOT NULL,
            title                  TEXT NOT NULL,
            published_at           TEXT NOT NULL,
            published_date         TEXT NOT NULL,
            url                    TEXT NOT NULL,
            employer               TEXT NOT NULL,
            department             TEXT,
            area                   TEXT NOT NULL,
            experience             TEXT NOT NULL,
            schedule               TEXT,
            employment             TEXT,
            description_lemmatized TEXT NOT NULL,
            skills_from_tags       TEXT NOT NULL,
            skills_from_text       TEXT NOT NULL,
            skills                 TEXT NOT NULL,
            salary_point           REAL,
            salary_base            REAL,
            salary_bin             TEXT NOT NULL,
            lat                    REAL,
            lon                    REAL,
            processed_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_postings_label ON postings(query_label);
        CREATE INDEX IF NOT EXISTS idx_postings_grade ON postings(experience);

        CREATE TABLE IF NOT EXISTS posting_skills (
            posting_id INTEGER NOT NULL,
            skill      TEXT NOT NULL,
            PRIMARY KEY (posting_id, skill)
        );

        CREATE TABLE IF NOT EXISTS geo_coords (
            area TEXT PRIMARY KEY,
            lat  REAL NOT NULL,
            lon  REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS run_metrics (
            id             INTEGER PRIMARY KEY,
            run_id         TEXT NOT NULL,
            pass_name      TEXT NOT NULL,
            records_before INTEGER NOT NULL,
            records_after  INTEGER NOT NULL,
            recorded_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS pipeline_stats (
            metric TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn clear_staging(conn: &Connection, query_label: &str) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM postings_staging WHERE query_label = ?",
        [query_label],
    )?;
    Ok(n)
}

pub fn insert_staging(conn: &Connection, posting: &RawPosting) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO postings_staging (
            id, query_label, title, published_at, url, employer, department,
            area, experience, tags, schedule, employment, description,
            salary_from, salary_to, currency
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    stmt.execute(rusqlite::params![
        posting.id,
        posting.query_label,
        posting.title,
        posting.published_at.to_rfc3339(),
        posting.url,
        posting.employer,
        posting.department,
        posting.area,
        posting.experience,
        serde_json::to_string(&posting.tags)?,
        posting.schedule,
        posting.employment,
        posting.description,
        posting.salary_from,
        posting.salary_to,
        posting.currency,
    ])?;
    Ok(())
}

pub fn fetch_staging(conn: &Connection) -> Result<Vec<RawPosting>> {
    fetch_raw_from(conn, "postings_staging")
}

pub fn fetch_raw(conn: &Connection) -> Result<Vec<RawPosting>> {
    fetch_raw_from(conn, "postings_raw")
}

fn fetch_raw_from(conn: &Connection, table: &str) -> Result<Vec<RawPosting>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, query_label, title, published_at, url, employer, department,
                area, experience, tags, schedule, employment, description,
                salary_from, salary_to, currency
         FROM {table}"
    ))?;

    let mut out = Vec::new();
    let mut raw_rows = stmt.query([])?;
    while let Some(row) = raw_rows.next()? {
        let id: i64 = row.get(0)?;
        let published: String = row.get(3)?;
        let tags_json: String = row.get(9)?;

        let published_at = match DateTime::parse_from_rfc3339(&published) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!(id, error = %e, "Skipping posting with unparseable timestamp");
                continue;
            }
        };
        let tags: Vec<String> = match serde_json::from_str(&tags_json) {
            Ok(t) => t,
            Err(e) => {
                warn!(id, error = %e, "Skipping posting with unparseable tag list");
                continue;
            }
        };

        out.push(RawPosting {
            id,
            query_label: row.get(1)?,
            title: row.get(2)?,
            published_at,
            url: row.get(4)?,
            employer: row.get(5)?,
            department: row.get(6)?,
            area: row.get(7)?,
            experience: row.get(8)?,
            tags,
            schedule: row.get(10)?,
            employment: row.get(11)?,
            description: row.get(12)?,
            salary_from: row.get(13)?,
            salary_to: row.get(14)?,
            currency: row.get(15)?,
        });
    }
    Ok(out)
}

/// Rewrite the accumulated corpus with the post-merge record set.
pub fn replace_raw(conn: &Connection, postings: &[RawPosting]) -> Result<()> {
    conn.execute("DELETE FROM postings_raw", [])?;
    let mut stmt = conn.prepare(
        "INSERT INTO postings_raw (
            id, query_label, title, published_at, url, employer, department,
            area, experience, tags, schedule, employment, description,
            salary_from, salary_to, currency
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for p in postings {
        stmt.execute(rusqlite::params![
            p.id,
            p.query_label,
            p.title,
            p.published_at.to_rfc3339(),
            p.url,
            p.employer,
            p.department,
            p.area,
            p.experience,
            serde_json::to_string(&p.tags)?,
            p.schedule,
            p.employment,
            p.description,
            p.salary_from,
            p.salary_to,
            p.currency,
        ])?;
    }
    Ok(())
}

/// Rewrite the normalized table and the exploded skills table together.
pub fn replace_normalized(conn: &Connection, postings: &[NormalizedPosting]) -> Result<()> {
    conn.execute("DELETE FROM postings", [])?;
    conn.execute("DELETE FROM posting_skills", [])?;

    let mut stmt = conn.prepare(
        "INSERT INTO postings (
            id, query_label, title, published_at, published_date, url, employer,
            department, area, experience, schedule, employment,
            description_lemmatized, skills_from_tags, skills_from_text, skills,
            salary_point, salary_base, salary_bin, lat, lon
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    let mut skill_stmt = conn
        .prepare("INSERT OR IGNORE INTO posting_skills (posting_id, skill) VALUES (?, ?)")?;

    for p in postings {
        stmt.execute(rusqlite::params![
            p.raw.id,
            p.raw.query_label,
            p.raw.title,
            p.raw.published_at.to_rfc3339(),
            p.raw.published_at.date_naive().to_string(),
            p.raw.url,
            p.raw.employer,
            p.raw.department,
            p.raw.area,
            p.grade.label(),
            p.raw.schedule,
            p.raw.employment,
            p.description_lemmatized,
            join_skills(&p.skills_from_tags),
            join_skills(&p.skills_from_text),
            p.skills,
            p.salary_point,
            p.salary_base,
            p.salary_bin.label(),
            p.lat,
            p.lon,
        ])?;
        for skill in p.skills.split(", ").filter(|s| !s.is_empty()) {
            skill_stmt.execute(rusqlite::params![p.raw.id, skill])?;
        }
    }
    Ok(())
}

pub fn fetch_geo_map(conn: &Connection) -> Result<HashMap<String, (f64, f64)>> {
    let mut stmt = conn.prepare("SELECT area, lat, lon FROM geo_coords")?;
    let mut map = HashMap::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let area: String = row.get(0)?;
        let lat: f64 = row.get(1)?;
        let lon: f64 = row.get(2)?;
        map.insert(area, (lat, lon));
    }
    Ok(map)
}

pub fn fetch_stats_rows(conn: &Connection) -> Result<Vec<StatsRow>> {
    let mut stmt = conn.prepare(
        "SELECT query_label, experience, area, salary_base, skills FROM postings",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StatsRow {
                query_label: row.get(0)?,
                grade: row.get(1)?,
                area: row.get(2)?,
                salary_base: row.get(3)?,
                skills: row.get(4)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

pub fn insert_run_metric(
    conn: &Connection,
    run_id: &str,
    pass_name: &str,
    before: usize,
    after: usize,
) -> Result<()> {
    conn.execute(
        "INSERT INTO run_metrics (run_id, pass_name, records_before, records_after)
         VALUES (?, ?, ?, ?)",
        rusqlite::params![run_id, pass_name, before as i64, after as i64],
    )?;
    Ok(())
}

pub fn upsert_stat(conn: &Connection, metric: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pipeline_stats (metric, value) VALUES (?, ?)",
        rusqlite::params![metric, value],
    )?;
    Ok(())
}
