use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use paper_punter::backtest::{BacktestConfig, BacktestReport, Backtester};
use paper_punter::calibration::Metrics;
use paper_punter::config::Settings;
use paper_punter::domain::MatchStatus;
use paper_punter::features::FeatureEngineer;
use paper_punter::policy::JsonPolicyStore;
use paper_punter::store::{MatchStore, SqliteStore};
use paper_punter::value_filter::ValueFilter;

/// Replay stored history through the full decision loop.
#[derive(Debug, clap::Parser, Clone)]
struct Args {
    #[clap(long)]
    db: Option<PathBuf>,

    /// number of earliest finished matches used for training
    #[clap(long)]
    split: Option<usize>,

    #[clap(long)]
    stake: Option<f64>,

    #[clap(long)]
    margin: Option<f64>,

    #[clap(long)]
    epsilon: Option<f64>,

    /// seed exploration for a reproducible run
    #[clap(long)]
    seed: Option<u64>,

    /// print every bet
    #[clap(long)]
    ledger: bool,
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
    if let Some(split) = args.split {
        settings.backtest_split = split;
    }
    if let Some(stake) = args.stake {
        settings.stake = stake.clamp(0.01, 1e6);
    }
    if let Some(margin) = args.margin {
        settings.value_margin = margin.clamp(0.0, 0.5);
    }
    if let Some(epsilon) = args.epsilon {
        settings.policy.epsilon = epsilon.clamp(0.0, 1.0);
    }
    if args.seed.is_some() {
        settings.policy.seed = args.seed;
    }

    let store = SqliteStore::open(&settings.db_path)?;
    let history = store.list_matches(Some(MatchStatus::Finished))?;

    let cfg = BacktestConfig {
        split_index: settings.backtest_split,
        stake: settings.stake,
        filter: ValueFilter::new(settings.value_margin),
        engineer: FeatureEngineer::new(settings.form_window),
        ..BacktestConfig::default()
    };
    let policy_store = JsonPolicyStore::new(settings.backtest_policy_path());
    let mut backtester = Backtester::new(cfg, policy_store, settings.policy)?;
    let report = backtester.run(&history)?;

    println!("Decision loop backtest");
    println!("DB: {}", settings.db_path.display());
    println!(
        "Matches: train={} replayed={}",
        report.train_samples, report.replayed
    );
    println!(
        "Stake: {:.2}  margin: {:.3}  epsilon: {:.2}",
        settings.stake, settings.value_margin, settings.policy.epsilon
    );
    println!();
    print_summary(&report);
    println!();
    print_metrics("Classifier on replayed matches", &report.holdout_metrics);
    print_metrics("Class-frequency baseline", &report.holdout_baseline);
    println!();
    println!("Confidence calibration bins:");
    for bin in report.holdout_bins.iter().filter(|b| b.count > 0) {
        println!(
            "  [{:.1}, {:.1})  n={:>4}  avg_conf={:.3}  hit_rate={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    if args.ledger {
        println!();
        println!("Ledger:");
        for e in &report.ledger {
            println!(
                "  {}  {:<32} {} @ {:>5.2}  conf={:.2}  {:<4} {:>+9.2}  bankroll={:>+10.2}",
                e.date,
                e.fixture,
                e.pick,
                e.odds_taken,
                e.confidence,
                e.result.as_str(),
                e.profit,
                e.bankroll
            );
        }
    }

    let buckets = backtester.agent().table();
    if !buckets.is_empty() {
        println!();
        println!("Learned policy (bucket: skip / bet):");
        for (key, q) in buckets {
            println!("  {key}: {:>+9.2} / {:>+9.2}", q[0], q[1]);
        }
    }
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    println!("Final bankroll: {:+.2}", report.final_bankroll);
    println!(
        "Bets: {}  wins: {}  losses: {}  hit rate: {:.1}%  ROI: {:+.2}%",
        report.bets,
        report.wins,
        report.losses,
        report.hit_rate() * 100.0,
        report.roi() * 100.0
    );
    println!(
        "Skipped: no market={}  unknown team={}  no value={}  policy={}",
        report.skips.no_market,
        report.skips.unknown_team,
        report.skips.no_value,
        report.skips.policy_skip
    );
    if let (Some(low), Some(high)) = (
        report.history.iter().copied().reduce(f64::min),
        report.history.iter().copied().reduce(f64::max),
    ) {
        println!("Bankroll range: {low:+.2} .. {high:+.2}");
    }
}

fn print_metrics(label: &str, m: &Metrics) {
    println!("{label}:");
    println!(
        "  n={}  accuracy={:.4}  log_loss={:.4}  brier={:.4}",
        m.samples, m.accuracy, m.log_loss, m.brier
    );
}
