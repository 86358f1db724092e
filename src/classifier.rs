use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::calibration::{self, Metrics, Prob3};
use crate::domain::{Match, Outcome};
use crate::encoder::{TeamEncoder, UnknownTeam};
use crate::features::{EnrichedMatch, FEATURE_COUNT, FeatureVector, TeamForm};

pub const CLASS_COUNT: usize = 3;
pub const MIN_TRAIN_SAMPLES: usize = 10;

const IMPROVEMENT_EPS: f64 = 1e-6;
const PATIENCE_CHECKS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitMode {
    /// Fit on every row.
    None,
    /// Earliest `train_fraction` of rows train, the rest validate.
    Chronological { train_fraction: f64 },
    /// Seeded shuffle before splitting. Offline evaluation only; leaks future form.
    Random { train_fraction: f64, seed: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub split: SplitMode,
    pub learning_rate: f64,
    pub l2: f64,
    pub max_iters: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            split: SplitMode::Chronological {
                train_fraction: 0.8,
            },
            learning_rate: 0.5,
            l2: 1e-3,
            max_iters: 800,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrainError {
    #[error("need at least {required} finished matches to train, got {available}")]
    NotEnoughData { required: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxParams {
    pub feature_means: [f64; FEATURE_COUNT],
    pub feature_stds: [f64; FEATURE_COUNT],
    pub weights: [[f64; FEATURE_COUNT]; CLASS_COUNT],
    pub bias: [f64; CLASS_COUNT],
}

impl SoftmaxParams {
    fn standardize(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        standardize(raw, &self.feature_means, &self.feature_stds)
    }

    fn probs(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let x = self.standardize(raw);
        softmax(logits(&self.weights, &self.bias, &x))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub outcome: Outcome,
    pub confidence: f64,
    pub probs: Prob3,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub train_samples: usize,
    pub val_samples: usize,
    /// Validation rows dropped because a team was absent from the training rows.
    pub val_unknown: usize,
    pub iterations: usize,
    pub train_metrics: Metrics,
    pub val_metrics: Option<Metrics>,
    pub baseline_val_metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: [f64; FEATURE_COUNT],
    outcome: Outcome,
}

/// Three-class (Home/Draw/Away) multinomial logistic model with its team encoder.
/// A value of this type is always trained; there is no unfitted state to fall back to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeClassifier {
    encoder: TeamEncoder,
    params: SoftmaxParams,
}

impl OutcomeClassifier {
    pub(crate) fn from_parts(encoder: TeamEncoder, params: SoftmaxParams) -> Self {
        Self { encoder, params }
    }

    pub fn encoder(&self) -> &TeamEncoder {
        &self.encoder
    }

    pub fn params(&self) -> &SoftmaxParams {
        &self.params
    }

    /// Fits on finished rows in the given order. The encoder only learns teams
    /// present in the training part of the split.
    pub fn fit(rows: &[EnrichedMatch], cfg: &TrainConfig) -> Result<(Self, TrainReport), TrainError> {
        let finished: Vec<&EnrichedMatch> = rows.iter().filter(|r| r.record.is_finished()).collect();
        if finished.len() < MIN_TRAIN_SAMPLES {
            return Err(TrainError::NotEnoughData {
                required: MIN_TRAIN_SAMPLES,
                available: finished.len(),
            });
        }

        let (train_rows, val_rows) = split_rows(finished, cfg.split);
        let encoder = TeamEncoder::fit(
            train_rows
                .iter()
                .flat_map(|r| [r.record.home_team.as_str(), r.record.away_team.as_str()]),
        );

        let train_raw: Vec<Sample> = train_rows.iter().filter_map(|r| sample(&encoder, r)).collect();
        let val_raw: Vec<Sample> = val_rows.iter().filter_map(|r| sample(&encoder, r)).collect();
        let val_unknown = val_rows.len() - val_raw.len();

        let (means, stds) = feature_norm_stats(&train_raw);
        let train: Vec<Sample> = train_raw
            .iter()
            .map(|s| Sample {
                x: standardize(&s.x, &means, &stds),
                outcome: s.outcome,
            })
            .collect();
        let val: Vec<Sample> = val_raw
            .iter()
            .map(|s| Sample {
                x: standardize(&s.x, &means, &stds),
                outcome: s.outcome,
            })
            .collect();

        let (weights, bias, iterations) = fit_weights(&train, &val, cfg);
        let params = SoftmaxParams {
            feature_means: means,
            feature_stds: stds,
            weights,
            bias,
        };

        let train_metrics = metrics_for(&params, &train);
        let (val_metrics, baseline_val_metrics) = if val.is_empty() {
            (None, None)
        } else {
            let train_outcomes: Vec<Outcome> = train.iter().map(|s| s.outcome).collect();
            let val_outcomes: Vec<Outcome> = val.iter().map(|s| s.outcome).collect();
            let baseline = calibration::empirical_outcome_probs(&train_outcomes);
            let baseline_preds = vec![baseline; val.len()];
            (
                Some(metrics_for(&params, &val)),
                Some(calibration::evaluate_probs(&baseline_preds, &val_outcomes)),
            )
        };

        info!(
            train = train.len(),
            val = val.len(),
            val_unknown,
            iterations,
            train_log_loss = train_metrics.log_loss,
            "outcome classifier fitted"
        );

        let report = TrainReport {
            train_samples: train.len(),
            val_samples: val.len(),
            val_unknown,
            iterations,
            train_metrics,
            val_metrics,
            baseline_val_metrics,
        };
        Ok((Self { encoder, params }, report))
    }

    /// Fits on every finished row, ignoring `cfg.split`. The encoder then knows
    /// every team in `rows`, including ones that only appear in the latest
    /// matches. Used for the model that trades live once held-out metrics are in.
    pub fn fit_all(rows: &[EnrichedMatch], cfg: &TrainConfig) -> Result<(Self, TrainReport), TrainError> {
        let cfg = TrainConfig {
            split: SplitMode::None,
            ..*cfg
        };
        Self::fit(rows, &cfg)
    }

    pub fn features_for(
        &self,
        record: &Match,
        home: TeamForm,
        away: TeamForm,
    ) -> Result<FeatureVector, UnknownTeam> {
        FeatureVector::build(&self.encoder, record, home, away)
    }

    pub fn predict_proba(&self, fv: &FeatureVector) -> Prob3 {
        Prob3::from_array(self.params.probs(&fv.to_array()))
    }

    /// Argmax class and its probability.
    pub fn predict(&self, fv: &FeatureVector) -> Prediction {
        let probs = self.predict_proba(fv);
        let outcome = probs.argmax();
        Prediction {
            outcome,
            confidence: probs.get(outcome),
            probs,
        }
    }
}

fn sample(encoder: &TeamEncoder, row: &EnrichedMatch) -> Option<Sample> {
    let score = row.record.score?;
    let fv = FeatureVector::build(encoder, &row.record, row.home, row.away).ok()?;
    Some(Sample {
        x: fv.to_array(),
        outcome: score.outcome(),
    })
}

fn split_rows(rows: Vec<&EnrichedMatch>, mode: SplitMode) -> (Vec<&EnrichedMatch>, Vec<&EnrichedMatch>) {
    match mode {
        SplitMode::None => (rows, Vec::new()),
        SplitMode::Chronological { train_fraction } => {
            let idx = train_split_index(rows.len(), train_fraction);
            let mut train = rows;
            let val = train.split_off(idx);
            (train, val)
        }
        SplitMode::Random {
            train_fraction,
            seed,
        } => {
            let idx = train_split_index(rows.len(), train_fraction);
            let mut shuffled = rows;
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
            let val = shuffled.split_off(idx);
            (shuffled, val)
        }
    }
}

fn train_split_index(n: usize, fraction: f64) -> usize {
    if n <= 2 {
        return n.saturating_sub(1).max(1);
    }
    let idx = ((n as f64) * fraction.clamp(0.0, 1.0)).round() as usize;
    idx.clamp(1, n - 1)
}

fn feature_norm_stats(samples: &[Sample]) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let mut mean = [0.0; FEATURE_COUNT];
    let mut stds = [1.0; FEATURE_COUNT];
    if samples.is_empty() {
        return (mean, stds);
    }

    let n = samples.len() as f64;
    for sample in samples {
        for i in 0..FEATURE_COUNT {
            mean[i] += sample.x[i];
        }
    }
    for v in &mut mean {
        *v /= n;
    }

    let mut var = [0.0; FEATURE_COUNT];
    for sample in samples {
        for i in 0..FEATURE_COUNT {
            let d = sample.x[i] - mean[i];
            var[i] += d * d;
        }
    }
    for i in 0..FEATURE_COUNT {
        stds[i] = (var[i] / n).sqrt().max(1e-6);
    }

    (mean, stds)
}

fn standardize(
    raw: &[f64; FEATURE_COUNT],
    means: &[f64; FEATURE_COUNT],
    stds: &[f64; FEATURE_COUNT],
) -> [f64; FEATURE_COUNT] {
    let mut out = [0.0; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        out[i] = (raw[i] - means[i]) / stds[i].max(1e-6);
    }
    out
}

type Weights = [[f64; FEATURE_COUNT]; CLASS_COUNT];

fn fit_weights(train: &[Sample], val: &[Sample], cfg: &TrainConfig) -> (Weights, [f64; CLASS_COUNT], usize) {
    let mut weights: Weights = [[0.0; FEATURE_COUNT]; CLASS_COUNT];
    let mut bias = [0.0; CLASS_COUNT];
    let mut best = (weights, bias);
    let mut best_val = log_loss(&weights, &bias, val);
    let mut no_improve = 0usize;
    let mut iterations = 0usize;
    let n = train.len().max(1) as f64;

    for iter in 0..cfg.max_iters {
        iterations = iter + 1;
        let mut grad_w: Weights = [[0.0; FEATURE_COUNT]; CLASS_COUNT];
        let mut grad_b = [0.0; CLASS_COUNT];

        for sample in train {
            let p = softmax(logits(&weights, &bias, &sample.x));
            for k in 0..CLASS_COUNT {
                let target = if sample.outcome.index() == k { 1.0 } else { 0.0 };
                let dz = p[k] - target;
                grad_b[k] += dz;
                for j in 0..FEATURE_COUNT {
                    grad_w[k][j] += dz * sample.x[j];
                }
            }
        }

        let lr = cfg.learning_rate / (1.0 + (iter as f64 * 0.003));
        for k in 0..CLASS_COUNT {
            bias[k] -= lr * grad_b[k] / n;
            for j in 0..FEATURE_COUNT {
                let g = grad_w[k][j] / n + cfg.l2 * weights[k][j];
                weights[k][j] -= lr * g;
            }
        }

        if val.is_empty() {
            continue;
        }
        if iter % 20 == 0 || iter + 1 == cfg.max_iters {
            let val_ll = log_loss(&weights, &bias, val);
            if val_ll + IMPROVEMENT_EPS < best_val {
                best_val = val_ll;
                best = (weights, bias);
                no_improve = 0;
            } else {
                no_improve = no_improve.saturating_add(1);
                if no_improve >= PATIENCE_CHECKS {
                    debug!(iter, best_val, "early stop on validation log loss");
                    break;
                }
            }
        }
    }

    if val.is_empty() {
        (weights, bias, iterations)
    } else {
        (best.0, best.1, iterations)
    }
}

fn log_loss(weights: &Weights, bias: &[f64; CLASS_COUNT], samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return f64::INFINITY;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let p = softmax(logits(weights, bias, &s.x));
            -p[s.outcome.index()].max(1e-12).ln()
        })
        .sum();
    sum / samples.len() as f64
}

fn metrics_for(params: &SoftmaxParams, standardized: &[Sample]) -> Metrics {
    let preds: Vec<Prob3> = standardized
        .iter()
        .map(|s| Prob3::from_array(softmax(logits(&params.weights, &params.bias, &s.x))))
        .collect();
    let outcomes: Vec<Outcome> = standardized.iter().map(|s| s.outcome).collect();
    calibration::evaluate_probs(&preds, &outcomes)
}

fn logits(weights: &Weights, bias: &[f64; CLASS_COUNT], x: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
    let mut out = *bias;
    for k in 0..CLASS_COUNT {
        out[k] += dot(&weights[k], x);
    }
    out
}

fn softmax(z: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let mx = z[0].max(z[1].max(z[2]));
    let e = [(z[0] - mx).exp(), (z[1] - mx).exp(), (z[2] - mx).exp()];
    let den = (e[0] + e[1] + e[2]).max(1e-12);
    [e[0] / den, e[1] / den, e[2] / den]
}

fn dot(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    let mut out = 0.0;
    for i in 0..FEATURE_COUNT {
        out += a[i] * b[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_is_normalized_and_stable() {
        let p = softmax([1000.0, 999.0, -1000.0]);
        let sum: f64 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn split_index_keeps_both_sides_non_empty() {
        assert_eq!(train_split_index(10, 0.8), 8);
        assert_eq!(train_split_index(10, 1.0), 9);
        assert_eq!(train_split_index(10, 0.0), 1);
    }

    #[test]
    fn zero_weights_predict_uniform_home() {
        let params = SoftmaxParams {
            feature_means: [0.0; FEATURE_COUNT],
            feature_stds: [1.0; FEATURE_COUNT],
            weights: [[0.0; FEATURE_COUNT]; CLASS_COUNT],
            bias: [0.0; CLASS_COUNT],
        };
        let clf = OutcomeClassifier::from_parts(TeamEncoder::fit(["A", "B"]), params);
        let fv = FeatureVector {
            home_team_id: 0,
            away_team_id: 1,
            home_odds: 2.0,
            draw_odds: 3.0,
            away_odds: 4.0,
            home: TeamForm::NEUTRAL,
            away: TeamForm::NEUTRAL,
        };
        let pred = clf.predict(&fv);
        assert_eq!(pred.outcome, Outcome::Home);
        assert!((pred.confidence - 1.0 / 3.0).abs() < 1e-12);
    }
}
