mod config;
mod db;
mod error;
mod fetch;
mod lemma;
mod normalize;
mod rates;
mod stats;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Settings;
use crate::normalize::{merge, skills, title, vocab};

#[derive(Parser)]
#[command(name = "vacancy_processor", about = "Labor-market postings normalization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one search query's postings into the staging batch
    Fetch {
        /// Search query, URL-encoded as the source expects it
        #[arg(short, long)]
        query: String,
        /// Label recorded on every posting this query produced
        #[arg(short, long)]
        label: String,
    },
    /// Merge the staged batch into the corpus and rebuild the dataset
    Process,
    /// Show statistics for the normalized dataset
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = Settings::load()?;
    info!(db_path = %settings.db_path, "Starting vacancy processor");

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch { query, label } => cmd_fetch(&settings, &query, &label).await,
        Commands::Process => cmd_process(&settings).await,
        Commands::Stats => cmd_stats(&settings),
    }
}

async fn cmd_fetch(settings: &Settings, query: &str, label: &str) -> Result<()> {
    println!("Vacancy Fetch");
    println!("=============\n");

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let client = reqwest::Client::new();
    let ids = fetch::search_ids(&client, &settings.api_base_url, query, settings.page_size).await?;
    println!("Found {} postings for '{}'\n", ids.len(), query);
    if ids.is_empty() {
        return Ok(());
    }

    db::clear_staging(&conn, label)?;
    let stats = fetch::fetch_postings_streaming(&conn, &client, settings, ids, label).await?;
    println!(
        "Fetched {}/{} postings ({} malformed, {} errors)",
        stats.ok, stats.total, stats.skipped, stats.errors
    );
    Ok(())
}

async fn cmd_process(settings: &Settings) -> Result<()> {
    println!("Vacancy Normalization");
    println!("=====================\n");

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let accumulated = db::fetch_raw(&conn)?;
    let batch = db::fetch_staging(&conn)?;
    println!(
        "Loaded {} accumulated + {} staged postings\n",
        accumulated.len(),
        batch.len()
    );
    if accumulated.is_empty() && batch.is_empty() {
        return Ok(());
    }

    let mut passes = normalize::PassLog::new(normalize::new_run_id());

    println!("Pass 1: title filter");
    let before = accumulated.len() + batch.len();
    let accumulated = title::filter_titles(accumulated);
    let batch = title::filter_titles(batch);
    passes.record("title_filter", before, accumulated.len() + batch.len());

    println!("Pass 2: batch merge");
    let before = accumulated.len() + batch.len();
    let corpus = merge::merge_batches(accumulated, batch, settings.batch_offset_hours);
    passes.record("batch_merge", before, corpus.len());

    println!("Pass 3: content duplicates");
    let before = corpus.len();
    let corpus = merge::drop_content_duplicates(corpus);
    passes.record("content_dedup", before, corpus.len());

    conn.execute("BEGIN TRANSACTION", [])?;
    db::replace_raw(&conn, &corpus)?;
    conn.execute("COMMIT", [])?;

    let client = reqwest::Client::new();

    println!("Pass 4: lemmatize descriptions");
    let texts: Vec<String> = corpus.iter().map(|p| p.description.clone()).collect();
    let lemmas = lemma::lemmatize_corpus(&client, &settings.lemma_url, &texts).await?;
    println!("  -> {} texts\n", lemmas.len());

    println!("Pass 5: build vocabulary");
    let tag_sets: Vec<_> = corpus.iter().map(|p| skills::normalize_tags(&p.tags)).collect();
    let vocabulary = vocab::build_vocabulary(tag_sets.iter(), settings.min_skill_postings);
    println!("  -> {} phrases\n", vocabulary.len());

    println!("Pass 6: exchange-rate snapshot");
    let rate_table = rates::fetch(&client, &settings.rates_url).await?;

    println!("Pass 7: normalize records");
    let geo = db::fetch_geo_map(&conn)?;
    let rows: Vec<normalize::RecordInput> = corpus
        .into_iter()
        .zip(tag_sets)
        .zip(lemmas)
        .map(|((raw, tags), lemma)| (raw, tags, lemma))
        .collect();
    let before = rows.len();
    let normalized = normalize::normalize_records(
        rows,
        &vocabulary,
        &rate_table,
        &geo,
        &settings.base_currency,
    )?;
    passes.record("normalize", before, normalized.len());

    conn.execute("BEGIN TRANSACTION", [])?;
    db::replace_normalized(&conn, &normalized)?;
    conn.execute("COMMIT", [])?;
    passes.persist(&conn)?;

    println!("\nDone.");
    Ok(())
}

fn cmd_stats(settings: &Settings) -> Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    stats::print_stats(&conn)
}
