pub const DEFAULT_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueFilter {
    pub margin: f64,
}

impl Default for ValueFilter {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
        }
    }
}

impl ValueFilter {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    pub fn accept(&self, confidence: f64, odds_taken: f64) -> bool {
        accept(confidence, odds_taken, self.margin)
    }
}

/// Probability encoded by a decimal price. Prices at or below 1.0 are "no market".
pub fn implied_probability(odds: f64) -> Option<f64> {
    if odds.is_finite() && odds > 1.0 {
        Some(1.0 / odds)
    } else {
        None
    }
}

/// `confidence >= 1/odds + margin`; invalid prices are rejected outright.
pub fn accept(confidence: f64, odds_taken: f64, margin: f64) -> bool {
    match implied_probability(odds_taken) {
        Some(implied) => confidence >= implied + margin,
        None => false,
    }
}
