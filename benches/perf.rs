use chrono::{Duration, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use paper_punter::backtest::{BacktestConfig, Backtester};
use paper_punter::classifier::{OutcomeClassifier, SplitMode, TrainConfig};
use paper_punter::domain::{MarketOdds, Match, Score};
use paper_punter::features::FeatureEngineer;
use paper_punter::ingest::parse_football_data_csv;
use paper_punter::policy::{MemoryPolicyStore, PolicyConfig};

const SEASON_CSV: &str = include_str!("../tests/fixtures/F1_sample.csv");

/// Deterministic 20-team league, `rounds` weeks long.
fn league(rounds: usize) -> Vec<Match> {
    let teams: Vec<String> = (0..20).map(|i| format!("Team {i:02}")).collect();
    let start = NaiveDate::from_ymd_opt(2021, 8, 7).unwrap_or_default();
    let mut out = Vec::with_capacity(rounds * 10);
    for round in 0..rounds {
        let day = start + Duration::days(7 * round as i64);
        for i in 0..10 {
            let h = (i + round) % 20;
            let a = (19 - i + round) % 20;
            let hg = ((h * 7 + round * 3) % 4) as u32;
            let ag = ((a * 5 + round) % 3) as u32;
            out.push(Match::new(
                day,
                teams[h].as_str(),
                teams[a].as_str(),
                MarketOdds::new(1.8 + (h % 5) as f64 * 0.3, 3.3, 2.2 + (a % 5) as f64 * 0.3),
                Some(Score { home: hg, away: ag }),
            ));
        }
    }
    out
}

fn bench_enrich(c: &mut Criterion) {
    let history = league(114);
    let engineer = FeatureEngineer::default();
    c.bench_function("enrich_three_seasons", |b| {
        b.iter(|| {
            let rows = engineer.enrich(black_box(&history));
            black_box(rows.len());
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let rows = FeatureEngineer::default().enrich(&league(60));
    let cfg = TrainConfig {
        split: SplitMode::None,
        max_iters: 200,
        ..TrainConfig::default()
    };
    let Ok((clf, _)) = OutcomeClassifier::fit(&rows, &cfg) else {
        return;
    };
    let features: Vec<_> = rows
        .iter()
        .filter_map(|r| clf.features_for(&r.record, r.home, r.away).ok())
        .collect();
    c.bench_function("predict_season", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for fv in &features {
                acc += clf.predict(black_box(fv)).confidence;
            }
            black_box(acc);
        })
    });
}

fn bench_csv_parse(c: &mut Criterion) {
    c.bench_function("football_data_csv_parse", |b| {
        b.iter(|| {
            let parsed = parse_football_data_csv(black_box(SEASON_CSV));
            black_box(parsed.matches.len());
        })
    });
}

fn bench_backtest(c: &mut Criterion) {
    let history = league(76);
    let policy = PolicyConfig {
        epsilon: 0.1,
        seed: Some(1),
        ..PolicyConfig::default()
    };
    let cfg = BacktestConfig {
        train: TrainConfig {
            split: SplitMode::None,
            max_iters: 200,
            ..TrainConfig::default()
        },
        ..BacktestConfig::default()
    };
    c.bench_function("backtest_replay", |b| {
        b.iter(|| {
            let Ok(mut bt) = Backtester::new(cfg, MemoryPolicyStore::new(), policy) else {
                return;
            };
            if let Ok(report) = bt.run(black_box(&history)) {
                black_box(report.final_bankroll);
            }
        })
    });
}

criterion_group!(
    perf,
    bench_enrich,
    bench_predict,
    bench_csv_parse,
    bench_backtest
);
criterion_main!(perf);
