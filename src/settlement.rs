use crate::domain::{BetResult, Outcome};

/// '1' on a home win, '2' on an away win, 'N' otherwise.
pub fn actual_outcome(home_score: u32, away_score: u32) -> Outcome {
    Outcome::from_scores(home_score, away_score)
}

pub fn settle(prediction: Outcome, actual: Outcome) -> BetResult {
    if prediction == actual {
        BetResult::Win
    } else {
        BetResult::Lose
    }
}

/// Net profit for a fixed stake at decimal odds. A pending bet has none yet.
pub fn profit(stake: f64, odds_taken: f64, result: BetResult) -> f64 {
    match result {
        BetResult::Win => stake * (odds_taken - 1.0),
        BetResult::Lose => -stake,
        BetResult::Pending => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actual_outcome_follows_goal_difference() {
        assert_eq!(actual_outcome(2, 1), Outcome::Home);
        assert_eq!(actual_outcome(0, 3), Outcome::Away);
        assert_eq!(actual_outcome(1, 1), Outcome::Draw);
        assert_eq!(actual_outcome(0, 0), Outcome::Draw);
    }

    #[test]
    fn profit_on_win_and_lose() {
        assert!((profit(100.0, 2.45, BetResult::Win) - 145.0).abs() < 1e-9);
        assert_eq!(profit(100.0, 2.45, BetResult::Lose), -100.0);
        assert_eq!(profit(100.0, 2.45, BetResult::Pending), 0.0);
    }

    #[test]
    fn settle_compares_codes() {
        assert_eq!(settle(Outcome::Draw, Outcome::Draw), BetResult::Win);
        assert_eq!(settle(Outcome::Home, Outcome::Away), BetResult::Lose);
    }
}
