use serde::{Deserialize, Serialize};

use crate::domain::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

impl Metrics {
    pub fn empty() -> Self {
        Self {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn from_array(p: [f64; 3]) -> Self {
        Self {
            home: p[0],
            draw: p[1],
            away: p[2],
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Most likely class; ties go to Home, then Draw.
    pub fn argmax(&self) -> Outcome {
        argmax(*self)
    }
}

pub fn empirical_outcome_probs(outcomes: &[Outcome]) -> Prob3 {
    if outcomes.is_empty() {
        return Prob3::uniform();
    }

    let mut counts = [0usize; 3];
    for outcome in outcomes {
        counts[outcome.index()] += 1;
    }
    let n = outcomes.len() as f64;
    Prob3 {
        home: counts[0] as f64 / n,
        draw: counts[1] as f64 / n,
        away: counts[2] as f64 / n,
    }
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::empty();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);
        log_loss_sum += -p.get(*outcome).clamp(1e-12, 1.0).ln();
        if argmax(*p) == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Reliability of the argmax confidence: predicted confidence vs hit rate per bucket.
pub fn confidence_bins(predictions: &[Prob3], outcomes: &[Outcome], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut hit_sum = vec![0.0_f64; bins];

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let pick = argmax(*p);
        let conf = p.get(pick).clamp(0.0, 1.0);
        let idx = ((conf * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += conf;
        if pick == *outcome {
            hit_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|idx| {
            let count = counts[idx];
            let denom = count.max(1) as f64;
            CalibrationBin {
                bucket_start: idx as f64 / bins as f64,
                bucket_end: (idx + 1) as f64 / bins as f64,
                count,
                avg_pred: pred_sum[idx] / denom,
                actual_rate: hit_sum[idx] / denom,
            }
        })
        .collect()
}

fn argmax(p: Prob3) -> Outcome {
    if p.home >= p.draw && p.home >= p.away {
        Outcome::Home
    } else if p.draw >= p.away {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

fn one_hot(outcome: Outcome) -> Prob3 {
    let mut p = [0.0; 3];
    p[outcome.index()] = 1.0;
    Prob3::from_array(p)
}
