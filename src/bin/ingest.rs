use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paper_punter::config::Settings;
use paper_punter::http_client::default_http_client;
use paper_punter::ingest::{self, parse_football_data_csv};
use paper_punter::store::{MatchStore, SqliteStore};

/// Load season results and fixtures into the match store.
#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// sqlite database path
    #[clap(long)]
    db: Option<PathBuf>,

    /// football-data league code, e.g. F1, E0
    #[clap(long)]
    league: Option<String>,

    /// first season start year
    #[clap(long)]
    first_season: Option<i32>,

    /// read local season files instead of downloading
    #[clap(long = "file")]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env();
    if let Some(db) = args.db {
        settings.db_path = db;
    }
    if let Some(league) = args.league {
        settings.league_code = league;
    }
    if let Some(first) = args.first_season {
        settings.first_season = first;
    }

    let mut store = SqliteStore::open(&settings.db_path)?;

    if !args.files.is_empty() {
        let mut total = 0usize;
        let mut skipped = 0usize;
        for path in &args.files {
            let raw = match std::fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path.display(), "unreadable season file: {err}");
                    continue;
                }
            };
            let parsed = parse_football_data_csv(&raw);
            skipped += parsed.skipped;
            total += store
                .upsert_matches(&parsed.matches)
                .with_context(|| format!("store rows from {}", path.display()))?;
        }
        println!("Files: {}", args.files.len());
        println!("Matches upserted: {total}");
        println!("Rows skipped: {skipped}");
        return Ok(());
    }

    let urls = ingest::season_urls(
        &settings.league_code,
        settings.first_season,
        Local::now().date_naive(),
    );
    info!(seasons = urls.len(), league = %settings.league_code, "fetching seasons");
    let client = default_http_client()?;
    let summary = ingest::ingest_seasons(&mut store, &client, &urls)?;

    println!("DB: {}", settings.db_path.display());
    println!(
        "Seasons: {}/{} fetched",
        summary.seasons_ok, summary.seasons_total
    );
    println!("Matches upserted: {}", summary.matches_upserted);
    println!("Rows skipped: {}", summary.skipped_rows);
    for err in &summary.errors {
        println!("  unavailable: {err}");
    }
    Ok(())
}
