//! Trailing per-team form built from finished match history.
//!
//! Every statistic for a match dated `d` is computed from games the team played
//! strictly before `d`. Training rows and live fixtures go through the same
//! [`summarize`] path so the two never drift apart.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Match;
use crate::encoder::{TeamEncoder, UnknownTeam};

pub const DEFAULT_WINDOW: usize = 5;

pub const FEATURE_COUNT: usize = 11;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "home_team_id",
    "away_team_id",
    "home_odds",
    "draw_odds",
    "away_odds",
    "home_form",
    "home_att",
    "home_def",
    "away_form",
    "away_att",
    "away_def",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamForm {
    /// Average points per game (3 win / 1 draw / 0 loss).
    pub form: f64,
    /// Average goals scored.
    pub attack: f64,
    /// Average goals conceded.
    pub defense: f64,
}

impl TeamForm {
    /// Returned when a team has fewer than `window` prior games.
    pub const NEUTRAL: TeamForm = TeamForm {
        form: 1.3,
        attack: 1.2,
        defense: 1.2,
    };

    pub const ZERO: TeamForm = TeamForm {
        form: 0.0,
        attack: 0.0,
        defense: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TeamGame {
    date: NaiveDate,
    points: f64,
    goals_for: f64,
    goals_against: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedMatch {
    pub record: Match,
    pub home: TeamForm,
    pub away: TeamForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_odds: f64,
    pub draw_odds: f64,
    pub away_odds: f64,
    pub home: TeamForm,
    pub away: TeamForm,
}

impl FeatureVector {
    pub fn build(
        encoder: &TeamEncoder,
        record: &Match,
        home: TeamForm,
        away: TeamForm,
    ) -> Result<Self, UnknownTeam> {
        Ok(Self {
            home_team_id: encoder.encode(&record.home_team)?,
            away_team_id: encoder.encode(&record.away_team)?,
            home_odds: record.odds.home,
            draw_odds: record.odds.draw,
            away_odds: record.odds.away,
            home,
            away,
        })
    }

    /// Column order matches [`FEATURE_NAMES`].
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.home_team_id as f64,
            self.away_team_id as f64,
            self.home_odds,
            self.draw_odds,
            self.away_odds,
            self.home.form,
            self.home.attack,
            self.home.defense,
            self.away.form,
            self.away.attack,
            self.away.defense,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEngineer {
    window: usize,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FeatureEngineer {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Trailing form for every (date, team) occurrence in `history`.
    /// Scheduled matches in `history` are ignored.
    pub fn rolling_stats(&self, history: &[Match]) -> HashMap<(NaiveDate, String), TeamForm> {
        let mut out = HashMap::new();
        for (team, games) in games_by_team(history) {
            let mut start_of_day = 0usize;
            for (idx, game) in games.iter().enumerate() {
                if idx > 0 && games[idx - 1].date != game.date {
                    start_of_day = idx;
                }
                let form = summarize(&games[..start_of_day], self.window);
                out.insert((game.date, team.clone()), form);
            }
        }
        out
    }

    /// Attaches home/away trailing form to each finished match, in input order.
    pub fn enrich(&self, history: &[Match]) -> Vec<EnrichedMatch> {
        let stats = self.rolling_stats(history);
        history
            .iter()
            .filter(|m| m.is_finished())
            .map(|m| EnrichedMatch {
                home: stats
                    .get(&(m.date, m.home_team.clone()))
                    .copied()
                    .unwrap_or(TeamForm::ZERO),
                away: stats
                    .get(&(m.date, m.away_team.clone()))
                    .copied()
                    .unwrap_or(TeamForm::ZERO),
                record: m.clone(),
            })
            .collect()
    }

    /// Form of `team` going into a fixture on `date`, from finished games before it.
    pub fn team_form_before(&self, history: &[Match], team: &str, date: NaiveDate) -> TeamForm {
        let mut games: Vec<TeamGame> = history
            .iter()
            .filter(|m| m.date < date && m.involves(team))
            .filter_map(|m| team_game(m, team))
            .collect();
        games.sort_by_key(|g| g.date);
        summarize(&games, self.window)
    }
}

fn games_by_team(history: &[Match]) -> HashMap<String, Vec<TeamGame>> {
    let mut by_team: HashMap<String, Vec<TeamGame>> = HashMap::new();
    for m in history {
        for team in [&m.home_team, &m.away_team] {
            if let Some(game) = team_game(m, team) {
                by_team.entry(team.clone()).or_default().push(game);
            }
        }
    }
    for games in by_team.values_mut() {
        // Stable so same-day games keep input order.
        games.sort_by_key(|g| g.date);
    }
    by_team
}

fn team_game(m: &Match, team: &str) -> Option<TeamGame> {
    let score = m.score?;
    let (goals_for, goals_against) = if m.home_team == team {
        (score.home, score.away)
    } else if m.away_team == team {
        (score.away, score.home)
    } else {
        return None;
    };
    let points = if goals_for > goals_against {
        3.0
    } else if goals_for == goals_against {
        1.0
    } else {
        0.0
    };
    Some(TeamGame {
        date: m.date,
        points,
        goals_for: goals_for as f64,
        goals_against: goals_against as f64,
    })
}

/// Mean of the last `window` games in `prior`, or the neutral defaults when
/// fewer than `window` are available.
fn summarize(prior: &[TeamGame], window: usize) -> TeamForm {
    if prior.len() < window {
        return TeamForm::NEUTRAL;
    }
    let recent = &prior[prior.len() - window..];
    let n = window as f64;
    TeamForm {
        form: recent.iter().map(|g| g.points).sum::<f64>() / n,
        attack: recent.iter().map(|g| g.goals_for).sum::<f64>() / n,
        defense: recent.iter().map(|g| g.goals_against).sum::<f64>() / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketOdds, Score};

    fn played(day: u32, home: &str, away: &str, hg: u32, ag: u32) -> Match {
        Match::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            home,
            away,
            MarketOdds::new(2.0, 3.2, 3.8),
            Some(Score { home: hg, away: ag }),
        )
    }

    #[test]
    fn summarize_uses_last_window_games() {
        let games: Vec<TeamGame> = (1..=6)
            .map(|d| TeamGame {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                points: if d == 1 { 0.0 } else { 3.0 },
                goals_for: d as f64,
                goals_against: 0.0,
            })
            .collect();
        let form = summarize(&games, 5);
        assert_eq!(form.form, 3.0);
        assert_eq!(form.attack, 4.0);
        assert_eq!(form.defense, 0.0);
    }

    #[test]
    fn same_day_games_do_not_see_each_other() {
        let history = vec![played(1, "A", "B", 3, 0), played(1, "A", "C", 0, 2)];
        let stats = FeatureEngineer::new(1).rolling_stats(&history);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(stats[&(day, "A".to_string())], TeamForm::NEUTRAL);
    }

    #[test]
    fn feature_vector_column_order() {
        let m = played(3, "A", "B", 1, 1);
        let enc = TeamEncoder::fit(["A", "B"]);
        let fv = FeatureVector::build(&enc, &m, TeamForm::NEUTRAL, TeamForm::ZERO).unwrap();
        let arr = fv.to_array();
        assert_eq!(arr[0], 0.0);
        assert_eq!(arr[1], 1.0);
        assert_eq!(arr[2], 2.0);
        assert_eq!(arr[5], 1.3);
        assert_eq!(arr[10], 0.0);
    }
}
