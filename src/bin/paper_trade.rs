use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paper_punter::artifact::{FileArtifactStore, ModelArtifactStore};
use paper_punter::classifier::OutcomeClassifier;
use paper_punter::config::Settings;
use paper_punter::features::FeatureEngineer;
use paper_punter::http_client::default_http_client;
use paper_punter::notifier::notifier_from_env;
use paper_punter::paper_trade::{PaperTradeConfig, PaperTrader};
use paper_punter::policy::{BetPolicyAgent, JsonPolicyStore, PolicyStore};
use paper_punter::store::SqliteStore;
use paper_punter::value_filter::ValueFilter;

/// Settle finished bets and place new ones on scheduled fixtures.
#[derive(Debug, clap::Parser, Clone)]
struct Args {
    #[clap(long)]
    db: Option<PathBuf>,

    #[clap(long)]
    model_version: Option<String>,

    /// only place new bets
    #[clap(long, conflicts_with = "check")]
    place: bool,

    /// only settle pending bets
    #[clap(long)]
    check: bool,

    /// wipe the learned policy before running
    #[clap(long)]
    reset_policy: bool,

    /// date recorded on new bets (YYYY-MM-DD), defaults to today
    #[clap(long)]
    today: Option<NaiveDate>,
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
    if let Some(version) = args.model_version {
        settings.model_version = version;
    }

    let artifact = FileArtifactStore::new(settings.models_dir())
        .load(&settings.model_version)
        .context("load trained model")?;
    let engineer = FeatureEngineer::new(artifact.form_window);
    let classifier = OutcomeClassifier::from_artifact(artifact);

    let mut policy_store = JsonPolicyStore::new(settings.policy_path());
    if args.reset_policy {
        policy_store.reset()?;
    }
    let agent = BetPolicyAgent::new(policy_store, settings.policy)?;

    let store = SqliteStore::open(&settings.db_path)?;
    let notifier = notifier_from_env(default_http_client()?);
    let cfg = PaperTradeConfig {
        stake: settings.stake,
        filter: ValueFilter::new(settings.value_margin),
        model_version: settings.model_version.clone(),
    };
    let mut trader = PaperTrader::new(store, classifier, engineer, agent, notifier, cfg);

    let run_all = !args.place && !args.check;
    if args.check || run_all {
        let s = trader.check_results()?;
        println!(
            "Settled: {} (wins {}, losses {})  profit: {:+.2}  awaiting result: {}",
            s.settled, s.wins, s.losses, s.profit, s.awaiting
        );
    }
    if args.place || run_all {
        let today = args.today.unwrap_or_else(|| Local::now().date_naive());
        info!(%today, model_version = %settings.model_version, "placing bets");
        let s = trader.place_new_bets(today)?;
        println!(
            "Fixtures: {}  placed: {}  skipped: {} (no market {}, unknown team {}, no value {}, policy {})",
            s.considered,
            s.placed,
            s.skips.total(),
            s.skips.no_market,
            s.skips.unknown_team,
            s.skips.no_value,
            s.skips.policy_skip
        );
    }
    Ok(())
}
