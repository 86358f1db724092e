use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use paper_punter::artifact::{FileArtifactStore, ModelArtifactStore};
use paper_punter::calibration::Metrics;
use paper_punter::classifier::{OutcomeClassifier, SplitMode, TrainConfig};
use paper_punter::config::Settings;
use paper_punter::domain::MatchStatus;
use paper_punter::features::FeatureEngineer;
use paper_punter::store::{MatchStore, SqliteStore};

/// Fit the outcome classifier on stored finished matches and save it.
#[derive(Debug, clap::Parser, Clone)]
struct Args {
    #[clap(long)]
    db: Option<PathBuf>,

    /// version tag the artifact is stored under
    #[clap(long)]
    model_version: Option<String>,

    /// trailing form window
    #[clap(long)]
    window: Option<usize>,

    /// share of rows used for fitting; the rest is held out
    #[clap(long, default_value_t = 0.8)]
    train_fraction: f64,

    /// shuffle before splitting (offline evaluation only)
    #[clap(long)]
    random_split: bool,

    #[clap(long, default_value_t = 42)]
    seed: u64,
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
    if let Some(window) = args.window {
        settings.form_window = window.max(1);
    }

    let store = SqliteStore::open(&settings.db_path)?;
    let history = store.list_matches(Some(MatchStatus::Finished))?;
    let engineer = FeatureEngineer::new(settings.form_window);
    let rows = engineer.enrich(&history);

    let train_fraction = args.train_fraction.clamp(0.05, 1.0);
    let split = if train_fraction >= 1.0 {
        SplitMode::None
    } else if args.random_split {
        SplitMode::Random {
            train_fraction,
            seed: args.seed,
        }
    } else {
        SplitMode::Chronological { train_fraction }
    };
    let cfg = TrainConfig {
        split,
        ..TrainConfig::default()
    };

    let (_, report) = OutcomeClassifier::fit(&rows, &cfg)?;
    // The saved model must know every team with results, including this season's newcomers.
    let (classifier, full_report) = OutcomeClassifier::fit_all(&rows, &cfg)?;
    let artifacts = FileArtifactStore::new(settings.models_dir());
    artifacts
        .save(&classifier.to_artifact(&settings.model_version, engineer.window()))
        .context("save trained model")?;

    println!("Outcome classifier training");
    println!("DB: {}", settings.db_path.display());
    println!("Model version: {}", settings.model_version);
    println!("Split: {split:?}");
    println!(
        "Samples: train={} held-out={} (unknown teams dropped: {})",
        report.train_samples, report.val_samples, report.val_unknown
    );
    println!("Iterations: {}", report.iterations);
    println!();
    print_metrics("Train", &report.train_metrics);
    if let Some(m) = &report.val_metrics {
        print_metrics("Held-out", m);
    }
    if let Some(m) = &report.baseline_val_metrics {
        print_metrics("Held-out baseline (class frequencies)", m);
    }
    println!();
    println!(
        "Saved model refit on all {} rows ({} teams, {} iterations)",
        full_report.train_samples,
        classifier.encoder().len(),
        full_report.iterations
    );
    println!("Saved: {}", artifacts.path_for(&settings.model_version).display());
    Ok(())
}

fn print_metrics(label: &str, m: &Metrics) {
    println!("{label}:");
    println!(
        "  n={}  accuracy={:.4}  log_loss={:.4}  brier={:.4}",
        m.samples, m.accuracy, m.log_loss, m.brier
    );
}
