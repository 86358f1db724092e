//! Live mode against stored fixtures. Placement and settlement run as separate
//! invocations; each walks its fixtures in order.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::classifier::OutcomeClassifier;
use crate::config::{DEFAULT_MODEL_VERSION, DEFAULT_STAKE};
use crate::decision::{self, Decision, SkipCounts};
use crate::domain::{BetResult, MatchStatus, NewBet};
use crate::features::FeatureEngineer;
use crate::notifier::{self, Notifier, SettlementLine};
use crate::policy::{Action, BetPolicyAgent, PolicyStore};
use crate::store::{BetStore, MatchStore};
use crate::value_filter::ValueFilter;

#[derive(Debug, Clone)]
pub struct PaperTradeConfig {
    pub stake: f64,
    pub filter: ValueFilter,
    pub model_version: String,
}

impl Default for PaperTradeConfig {
    fn default() -> Self {
        Self {
            stake: DEFAULT_STAKE,
            filter: ValueFilter::default(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementSummary {
    pub considered: usize,
    pub placed: usize,
    /// Bets refused by the store because the match already had one.
    pub duplicates: usize,
    pub skips: SkipCounts,
    pub notify_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementSummary {
    pub settled: usize,
    pub wins: usize,
    pub losses: usize,
    pub profit: f64,
    /// Pending bets whose match has no result yet.
    pub awaiting: usize,
    pub notified: bool,
}

pub struct PaperTrader<St, P, N>
where
    St: MatchStore + BetStore,
    P: PolicyStore,
    N: Notifier,
{
    store: St,
    classifier: OutcomeClassifier,
    engineer: FeatureEngineer,
    agent: BetPolicyAgent<P>,
    notifier: N,
    cfg: PaperTradeConfig,
}

impl<St, P, N> PaperTrader<St, P, N>
where
    St: MatchStore + BetStore,
    P: PolicyStore,
    N: Notifier,
{
    pub fn new(
        store: St,
        classifier: OutcomeClassifier,
        engineer: FeatureEngineer,
        agent: BetPolicyAgent<P>,
        notifier: N,
        cfg: PaperTradeConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            engineer,
            agent,
            notifier,
            cfg,
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut St {
        &mut self.store
    }

    pub fn agent(&self) -> &BetPolicyAgent<P> {
        &self.agent
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Decides on every scheduled fixture without a bet, using form from
    /// finished games dated before each fixture.
    pub fn place_new_bets(&mut self, today: NaiveDate) -> Result<PlacementSummary> {
        let history = self
            .store
            .list_matches(Some(MatchStatus::Finished))
            .context("load finished history")?;
        let fixtures = self
            .store
            .list_scheduled_matches_without_bet()
            .context("load open fixtures")?;

        let mut summary = PlacementSummary::default();
        for fixture in &fixtures {
            summary.considered += 1;
            let home = self
                .engineer
                .team_form_before(&history, &fixture.home_team, fixture.date);
            let away = self
                .engineer
                .team_form_before(&history, &fixture.away_team, fixture.date);

            let decision = decision::evaluate(
                &self.classifier,
                &self.cfg.filter,
                &mut self.agent,
                fixture,
                home,
                away,
            );
            decision::log_decision(fixture, &decision);

            let (prediction, odds_taken) = match decision {
                Decision::Bet {
                    prediction,
                    odds_taken,
                } => (prediction, odds_taken),
                other => {
                    summary.skips.record(&other);
                    continue;
                }
            };

            let bet = NewBet {
                match_id: fixture.id.clone(),
                prediction: prediction.outcome,
                confidence: prediction.confidence,
                stake: self.cfg.stake,
                odds_taken,
                bet_date: today,
                model_version: self.cfg.model_version.clone(),
            };
            let Some(bet_id) = self.store.insert_bet(&bet)? else {
                warn!(fixture = %fixture.label(), "match already has a bet");
                summary.duplicates += 1;
                continue;
            };
            summary.placed += 1;
            info!(bet_id, fixture = %fixture.label(), "bet placed");

            let message = notifier::placement_message(fixture, prediction.outcome, odds_taken, prediction.confidence);
            if !notifier::notify_best_effort(&self.notifier, &message) {
                summary.notify_failures += 1;
            }
        }

        info!(
            considered = summary.considered,
            placed = summary.placed,
            skipped = summary.skips.total(),
            "placement finished"
        );
        Ok(summary)
    }

    /// Settles pending bets whose match has finished. The bet row is closed
    /// before the policy learns, so a bet is never counted twice.
    pub fn check_results(&mut self) -> Result<SettlementSummary> {
        let pending = self
            .store
            .list_pending_bets_with_match()
            .context("load pending bets")?;

        let mut summary = SettlementSummary::default();
        let mut settled = Vec::new();
        for item in &pending {
            let Some(score) = item.fixture.score else {
                summary.awaiting += 1;
                continue;
            };
            let mut bet = item.bet.clone();
            let profit = bet.settle(score.outcome())?;
            self.store.settle_bet(bet.id, bet.result, profit)?;
            self.agent
                .learn(bet.confidence, Action::Bet, profit)
                .with_context(|| format!("learn from bet {}", bet.id))?;

            summary.settled += 1;
            summary.profit += profit;
            match bet.result {
                BetResult::Win => summary.wins += 1,
                BetResult::Lose => summary.losses += 1,
                BetResult::Pending => {}
            }
            settled.push(SettlementLine {
                fixture: &item.fixture,
                pick: bet.prediction,
                result: bet.result,
                profit,
            });
        }

        if settled.is_empty() {
            info!(awaiting = summary.awaiting, "no results to settle");
        } else {
            let report = notifier::settlement_report(&settled);
            summary.notified = notifier::notify_best_effort(&self.notifier, &report);
            info!(
                settled = summary.settled,
                profit = summary.profit,
                "settlement finished"
            );
        }
        Ok(summary)
    }
}
