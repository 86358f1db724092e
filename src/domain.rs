use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Class-priority order; ties between probabilities resolve to the earlier entry.
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn code(self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "N",
            Outcome::Away => "2",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Outcome::Home),
            "N" | "n" => Some(Outcome::Draw),
            "2" => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn from_scores(home_goals: u32, away_goals: u32) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if away_goals > home_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    Finished,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "SCHEDULED" => Some(MatchStatus::Scheduled),
            "FINISHED" => Some(MatchStatus::Finished),
            _ => None,
        }
    }
}

/// Decimal 1X2 prices. A price of 0.0 means the market was not available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketOdds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl MarketOdds {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self {
            home: normalize_price(home),
            draw: normalize_price(draw),
            away: normalize_price(away),
        }
    }

    pub fn for_outcome(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// True when every leg carries a usable price (> 1.0).
    pub fn is_complete(&self) -> bool {
        [self.home, self.draw, self.away]
            .iter()
            .all(|p| p.is_finite() && *p > 1.0)
    }
}

fn normalize_price(raw: f64) -> f64 {
    if raw.is_finite() && raw >= 1.0 { raw } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn outcome(self) -> Outcome {
        Outcome::from_scores(self.home, self.away)
    }
}

/// A fixture. The status is derived from the score so a finished match always
/// carries both goals and a scheduled one carries none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub odds: MarketOdds,
    pub score: Option<Score>,
}

impl Match {
    pub fn new(
        date: NaiveDate,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        odds: MarketOdds,
        score: Option<Score>,
    ) -> Self {
        let home_team = home_team.into();
        let away_team = away_team.into();
        Self {
            id: match_id(date, &home_team, &away_team),
            date,
            home_team,
            away_team,
            odds,
            score,
        }
    }

    pub fn status(&self) -> MatchStatus {
        if self.score.is_some() {
            MatchStatus::Finished
        } else {
            MatchStatus::Scheduled
        }
    }

    pub fn is_finished(&self) -> bool {
        self.score.is_some()
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.home_team, self.away_team)
    }
}

pub fn match_id(date: NaiveDate, home_team: &str, away_team: &str) -> String {
    format!("{}_{}_{}", date.format("%Y-%m-%d"), home_team, away_team).replace(' ', "")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetResult {
    Pending,
    Win,
    Lose,
}

impl BetResult {
    pub fn as_str(self) -> &'static str {
        match self {
            BetResult::Pending => "PENDING",
            BetResult::Win => "WIN",
            BetResult::Lose => "LOSE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "PENDING" => Some(BetResult::Pending),
            "WIN" => Some(BetResult::Win),
            "LOSE" => Some(BetResult::Lose),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettleError {
    #[error("bet {bet_id} already settled as {result:?}")]
    AlreadySettled { bet_id: i64, result: BetResult },
}

/// A bet as it is about to be written; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBet {
    pub match_id: String,
    pub prediction: Outcome,
    pub confidence: f64,
    pub stake: f64,
    pub odds_taken: f64,
    pub bet_date: NaiveDate,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    pub id: i64,
    pub match_id: String,
    pub prediction: Outcome,
    pub confidence: f64,
    pub stake: f64,
    pub odds_taken: f64,
    pub result: BetResult,
    pub profit: Option<f64>,
    pub bet_date: NaiveDate,
    pub model_version: String,
}

impl Bet {
    /// Moves a pending bet to WIN or LOSE and returns the realised profit.
    pub fn settle(&mut self, actual: Outcome) -> Result<f64, SettleError> {
        if self.result != BetResult::Pending {
            return Err(SettleError::AlreadySettled {
                bet_id: self.id,
                result: self.result,
            });
        }
        let result = crate::settlement::settle(self.prediction, actual);
        let profit = crate::settlement::profit(self.stake, self.odds_taken, result);
        self.result = result;
        self.profit = Some(profit);
        Ok(profit)
    }
}
