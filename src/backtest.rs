//! Historical replay: fit once on a chronological prefix, then walk the rest
//! one fixture at a time, settling and learning before the next decision.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::info;

use crate::calibration::{self, CalibrationBin, Metrics, Prob3};
use crate::classifier::{OutcomeClassifier, SplitMode, TrainConfig, TrainReport};
use crate::config::{DEFAULT_BACKTEST_SPLIT, DEFAULT_STAKE};
use crate::decision::{self, Decision, SkipCounts};
use crate::domain::{BetResult, Match, Outcome};
use crate::features::{EnrichedMatch, FeatureEngineer};
use crate::policy::{Action, BetPolicyAgent, PolicyConfig, PolicyStore};
use crate::settlement;
use crate::value_filter::ValueFilter;

#[derive(Debug, Clone, Copy)]
pub struct BacktestConfig {
    /// Number of earliest finished matches used for training.
    pub split_index: usize,
    pub stake: f64,
    pub filter: ValueFilter,
    pub engineer: FeatureEngineer,
    pub train: TrainConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            split_index: DEFAULT_BACKTEST_SPLIT,
            stake: DEFAULT_STAKE,
            filter: ValueFilter::default(),
            engineer: FeatureEngineer::default(),
            train: TrainConfig {
                split: SplitMode::None,
                ..TrainConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub match_id: String,
    pub date: NaiveDate,
    pub fixture: String,
    pub pick: Outcome,
    pub confidence: f64,
    pub stake: f64,
    pub odds_taken: f64,
    pub result: BetResult,
    pub profit: f64,
    pub bankroll: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub train_samples: usize,
    pub replayed: usize,
    pub bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub skips: SkipCounts,
    /// Cumulative profit, starting from zero.
    pub final_bankroll: f64,
    /// Bankroll after each bet.
    pub history: Vec<f64>,
    pub ledger: Vec<LedgerEntry>,
    pub train_report: TrainReport,
    /// Classifier quality on the replayed fixtures it could encode.
    pub holdout_metrics: Metrics,
    pub holdout_baseline: Metrics,
    /// Argmax confidence against hit rate on the replayed fixtures.
    pub holdout_bins: Vec<CalibrationBin>,
}

impl BacktestReport {
    pub fn staked(&self) -> f64 {
        self.ledger.iter().map(|e| e.stake).sum()
    }

    pub fn hit_rate(&self) -> f64 {
        if self.bets == 0 {
            0.0
        } else {
            self.wins as f64 / self.bets as f64
        }
    }

    /// Profit over total stake.
    pub fn roi(&self) -> f64 {
        let staked = self.staked();
        if staked <= 0.0 { 0.0 } else { self.final_bankroll / staked }
    }
}

pub struct Backtester<S: PolicyStore> {
    cfg: BacktestConfig,
    agent: BetPolicyAgent<S>,
}

impl<S: PolicyStore> Backtester<S> {
    /// Clears `store` first; an unreadable leftover table is discarded, not loaded.
    pub fn new(cfg: BacktestConfig, mut store: S, policy: PolicyConfig) -> Result<Self> {
        store.reset()?;
        let agent = BetPolicyAgent::new(store, policy)?;
        Ok(Self { cfg, agent })
    }

    pub fn agent(&self) -> &BetPolicyAgent<S> {
        &self.agent
    }

    pub fn into_agent(self) -> BetPolicyAgent<S> {
        self.agent
    }

    /// Every call starts from an empty policy table.
    pub fn run(&mut self, history: &[Match]) -> Result<BacktestReport> {
        self.agent.reset()?;
        let mut finished: Vec<Match> = history.iter().filter(|m| m.is_finished()).cloned().collect();
        finished.sort_by_key(|m| m.date);

        let split = self.cfg.split_index;
        if finished.len() <= split {
            bail!(
                "backtest needs more than {split} finished matches, found {}",
                finished.len()
            );
        }

        let enriched = self.cfg.engineer.enrich(&finished);
        let (train_rows, replay_rows) = enriched.split_at(split);
        let (classifier, train_report) = OutcomeClassifier::fit(train_rows, &self.cfg.train)?;
        info!(
            train = train_rows.len(),
            replay = replay_rows.len(),
            "backtest classifier fitted"
        );

        let holdout = holdout_quality(&classifier, train_rows, replay_rows);

        let mut report = BacktestReport {
            train_samples: train_rows.len(),
            replayed: replay_rows.len(),
            bets: 0,
            wins: 0,
            losses: 0,
            skips: SkipCounts::default(),
            final_bankroll: 0.0,
            history: Vec::new(),
            ledger: Vec::new(),
            train_report,
            holdout_metrics: holdout.metrics,
            holdout_baseline: holdout.baseline,
            holdout_bins: holdout.bins,
        };

        for row in replay_rows {
            let decision = decision::evaluate(
                &classifier,
                &self.cfg.filter,
                &mut self.agent,
                &row.record,
                row.home,
                row.away,
            );
            decision::log_decision(&row.record, &decision);

            let (prediction, odds_taken) = match decision {
                Decision::Bet {
                    prediction,
                    odds_taken,
                } => (prediction, odds_taken),
                other => {
                    report.skips.record(&other);
                    continue;
                }
            };
            let Some(score) = row.record.score else {
                continue;
            };

            let result = settlement::settle(prediction.outcome, score.outcome());
            let profit = settlement::profit(self.cfg.stake, odds_taken, result);
            self.agent.learn(prediction.confidence, Action::Bet, profit)?;

            report.bets += 1;
            match result {
                BetResult::Win => report.wins += 1,
                BetResult::Lose => report.losses += 1,
                BetResult::Pending => {}
            }
            report.final_bankroll += profit;
            report.history.push(report.final_bankroll);
            report.ledger.push(LedgerEntry {
                match_id: row.record.id.clone(),
                date: row.record.date,
                fixture: row.record.label(),
                pick: prediction.outcome,
                confidence: prediction.confidence,
                stake: self.cfg.stake,
                odds_taken,
                result,
                profit,
                bankroll: report.final_bankroll,
            });
        }

        info!(
            bets = report.bets,
            wins = report.wins,
            bankroll = report.final_bankroll,
            "backtest finished"
        );
        Ok(report)
    }
}

struct Holdout {
    metrics: Metrics,
    baseline: Metrics,
    bins: Vec<CalibrationBin>,
}

const CALIBRATION_BINS: usize = 10;

fn holdout_quality(
    classifier: &OutcomeClassifier,
    train_rows: &[EnrichedMatch],
    replay_rows: &[EnrichedMatch],
) -> Holdout {
    let mut preds = Vec::new();
    let mut outcomes = Vec::new();
    for row in replay_rows {
        let Some(score) = row.record.score else {
            continue;
        };
        if let Ok(fv) = classifier.features_for(&row.record, row.home, row.away) {
            preds.push(classifier.predict_proba(&fv));
            outcomes.push(score.outcome());
        }
    }
    let train_outcomes: Vec<Outcome> = train_rows
        .iter()
        .filter_map(|r| r.record.score.map(|s| s.outcome()))
        .collect();
    let baseline: Prob3 = calibration::empirical_outcome_probs(&train_outcomes);
    let baseline_preds = vec![baseline; preds.len()];
    Holdout {
        metrics: calibration::evaluate_probs(&preds, &outcomes),
        baseline: calibration::evaluate_probs(&baseline_preds, &outcomes),
        bins: calibration::confidence_bins(&preds, &outcomes, CALIBRATION_BINS),
    }
}
