//! Per-fixture decision shared by backtest replay and paper trading.
//!
//! Order: market check, team encoding, prediction, value filter, policy.

use tracing::{debug, info};

use crate::classifier::{OutcomeClassifier, Prediction};
use crate::domain::{MarketOdds, Match};
use crate::encoder::UnknownTeam;
use crate::features::TeamForm;
use crate::policy::{Action, BetPolicyAgent, PolicyStore};
use crate::value_filter::ValueFilter;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// At least one 1X2 price is missing or not above 1.0.
    NoMarket,
    UnknownTeam(UnknownTeam),
    NoValue { prediction: Prediction, odds_taken: f64 },
    PolicySkip { prediction: Prediction, odds_taken: f64 },
    Bet { prediction: Prediction, odds_taken: f64 },
}

impl Decision {
    pub fn is_bet(&self) -> bool {
        matches!(self, Decision::Bet { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decision::NoMarket => "no_market",
            Decision::UnknownTeam(_) => "unknown_team",
            Decision::NoValue { .. } => "no_value",
            Decision::PolicySkip { .. } => "policy_skip",
            Decision::Bet { .. } => "bet",
        }
    }
}

/// Value filter then policy, for an already computed prediction.
pub fn gate<S: PolicyStore>(
    prediction: Prediction,
    odds: &MarketOdds,
    filter: &ValueFilter,
    agent: &mut BetPolicyAgent<S>,
) -> Decision {
    let odds_taken = odds.for_outcome(prediction.outcome);
    if !filter.accept(prediction.confidence, odds_taken) {
        return Decision::NoValue {
            prediction,
            odds_taken,
        };
    }
    match agent.decide(prediction.confidence) {
        Action::Bet => Decision::Bet {
            prediction,
            odds_taken,
        },
        Action::Skip => Decision::PolicySkip {
            prediction,
            odds_taken,
        },
    }
}

pub fn evaluate<S: PolicyStore>(
    classifier: &OutcomeClassifier,
    filter: &ValueFilter,
    agent: &mut BetPolicyAgent<S>,
    fixture: &Match,
    home: TeamForm,
    away: TeamForm,
) -> Decision {
    if !fixture.odds.is_complete() {
        return Decision::NoMarket;
    }
    let fv = match classifier.features_for(fixture, home, away) {
        Ok(fv) => fv,
        Err(err) => return Decision::UnknownTeam(err),
    };
    let prediction = classifier.predict(&fv);
    gate(prediction, &fixture.odds, filter, agent)
}

pub fn log_decision(fixture: &Match, decision: &Decision) {
    let fixture = fixture.label();
    match decision {
        Decision::NoMarket => debug!(%fixture, "no market"),
        Decision::UnknownTeam(err) => info!(%fixture, "skipped: {err}"),
        Decision::NoValue {
            prediction,
            odds_taken,
        } => debug!(
            %fixture,
            pick = %prediction.outcome,
            confidence = prediction.confidence,
            odds_taken,
            "no value"
        ),
        Decision::PolicySkip { prediction, .. } => {
            info!(%fixture, confidence = prediction.confidence, "policy skip")
        }
        Decision::Bet {
            prediction,
            odds_taken,
        } => info!(
            %fixture,
            pick = %prediction.outcome,
            confidence = prediction.confidence,
            odds_taken,
            "bet"
        ),
    }
}

/// Tally of non-bet outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub no_market: usize,
    pub unknown_team: usize,
    pub no_value: usize,
    pub policy_skip: usize,
}

impl SkipCounts {
    pub fn record(&mut self, decision: &Decision) {
        match decision {
            Decision::NoMarket => self.no_market += 1,
            Decision::UnknownTeam(_) => self.unknown_team += 1,
            Decision::NoValue { .. } => self.no_value += 1,
            Decision::PolicySkip { .. } => self.policy_skip += 1,
            Decision::Bet { .. } => {}
        }
    }

    pub fn total(&self) -> usize {
        self.no_market + self.unknown_team + self.no_value + self.policy_skip
    }
}
