//! Epsilon-greedy bet/skip gate over confidence buckets.
//!
//! This is a one-step bandit: each decision is settled on its own and the
//! update moves the action value toward the realised profit. `gamma` is carried
//! in the config and the persisted settings but never enters the update, since
//! there is no successor state to bootstrap from.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::persist;

pub const DEFAULT_ALPHA: f64 = 0.1;
pub const DEFAULT_GAMMA: f64 = 0.9;
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Bucket key -> `[value_of_skip, value_of_bet]`.
pub type QTable = BTreeMap<String, [f64; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Skip = 0,
    Bet = 1,
}

impl Action {
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Skip => f.write_str("SKIP"),
            Action::Bet => f.write_str("BET"),
        }
    }
}

/// Confidence rounded to one decimal, e.g. `0.74 -> "0.7"`.
///
/// Existing policy files are keyed this way; changing it invalidates them.
pub fn state_key(confidence: f64) -> String {
    format!("{:.1}", confidence)
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy store {} is unreadable; reset it explicitly to start over: {source}", path.display())]
    Corrupt { path: PathBuf, source: io::Error },

    #[error("failed to persist policy store {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub trait PolicyStore {
    /// Empty table when nothing has been stored yet.
    fn load(&self) -> Result<QTable, PolicyError>;
    /// Must replace the stored table as a whole or not at all.
    fn save(&mut self, table: &QTable) -> Result<(), PolicyError>;
    fn reset(&mut self) -> Result<(), PolicyError>;
}

/// Flat JSON object `{"0.7": [skip, bet], ...}` written with tmp + rename.
#[derive(Debug, Clone)]
pub struct JsonPolicyStore {
    path: PathBuf,
}

impl JsonPolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicyStore for JsonPolicyStore {
    fn load(&self) -> Result<QTable, PolicyError> {
        let table = persist::read_json::<QTable>(&self.path).map_err(|source| PolicyError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(table.unwrap_or_default())
    }

    fn save(&mut self, table: &QTable) -> Result<(), PolicyError> {
        persist::write_json_atomic(&self.path, table).map_err(|source| PolicyError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn reset(&mut self) -> Result<(), PolicyError> {
        info!(path = %self.path.display(), "resetting policy store");
        self.save(&QTable::new())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyStore {
    table: QTable,
    saves: usize,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: QTable) -> Self {
        Self { table, saves: 0 }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Number of successful `save` calls.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn load(&self) -> Result<QTable, PolicyError> {
        Ok(self.table.clone())
    }

    fn save(&mut self, table: &QTable) -> Result<(), PolicyError> {
        self.table = table.clone();
        self.saves += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), PolicyError> {
        self.table.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub alpha: f64,
    /// Inert: one-step rewards leave nothing to discount.
    pub gamma: f64,
    pub epsilon: f64,
    /// Fixed seed for reproducible exploration; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            epsilon: DEFAULT_EPSILON,
            seed: None,
        }
    }
}

pub struct BetPolicyAgent<S: PolicyStore> {
    store: S,
    table: QTable,
    cfg: PolicyConfig,
    rng: StdRng,
}

impl<S: PolicyStore> BetPolicyAgent<S> {
    /// Loads the table once. An unreadable store is an error, never an empty table.
    pub fn new(store: S, cfg: PolicyConfig) -> Result<Self, PolicyError> {
        let table = store.load()?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(buckets = table.len(), epsilon = cfg.epsilon, alpha = cfg.alpha, "policy loaded");
        Ok(Self {
            store,
            table,
            cfg,
            rng,
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    pub fn gamma(&self) -> f64 {
        self.cfg.gamma
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Current values for the bucket of `confidence`, `[0, 0]` if never seen.
    pub fn q_values(&self, confidence: f64) -> [f64; 2] {
        self.table.get(&state_key(confidence)).copied().unwrap_or([0.0, 0.0])
    }

    pub fn decide(&mut self, confidence: f64) -> Action {
        let key = state_key(confidence);
        let q = *self.table.entry(key).or_insert([0.0, 0.0]);
        let epsilon = self.cfg.epsilon.clamp(0.0, 1.0);
        if epsilon > 0.0 && self.rng.gen_bool(epsilon) {
            return if self.rng.gen_bool(0.5) {
                Action::Bet
            } else {
                Action::Skip
            };
        }
        greedy(q)
    }

    /// `Q[s][a] += alpha * (reward - Q[s][a])`, then persists the whole table.
    /// If the write fails the in-memory value is restored and the error returned.
    pub fn learn(&mut self, confidence: f64, action: Action, reward: f64) -> Result<f64, PolicyError> {
        let key = state_key(confidence);
        let previous = self.table.get(&key).copied();
        let mut q = previous.unwrap_or([0.0, 0.0]);
        let idx = action.index();
        q[idx] += self.cfg.alpha * (reward - q[idx]);
        self.table.insert(key.clone(), q);

        if let Err(err) = self.store.save(&self.table) {
            match previous {
                Some(old) => {
                    self.table.insert(key, old);
                }
                None => {
                    self.table.remove(&key);
                }
            }
            return Err(err);
        }

        debug!(state = %key, %action, reward, q = q[idx], "policy updated");
        Ok(q[idx])
    }

    /// Clears the table both in memory and in the store.
    pub fn reset(&mut self) -> Result<(), PolicyError> {
        self.store.reset()?;
        self.table.clear();
        Ok(())
    }
}

/// Ties favour betting.
fn greedy(q: [f64; 2]) -> Action {
    if q[Action::Bet.index()] >= q[Action::Skip.index()] {
        Action::Bet
    } else {
        Action::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy_agent(table: QTable) -> BetPolicyAgent<MemoryPolicyStore> {
        let cfg = PolicyConfig {
            epsilon: 0.0,
            seed: Some(7),
            ..PolicyConfig::default()
        };
        BetPolicyAgent::new(MemoryPolicyStore::with_table(table), cfg).unwrap()
    }

    #[test]
    fn state_key_rounds_to_one_decimal() {
        assert_eq!(state_key(0.74), "0.7");
        assert_eq!(state_key(0.76), "0.8");
        assert_eq!(state_key(1.0), "1.0");
        assert_eq!(state_key(0.0), "0.0");
    }

    #[test]
    fn fresh_bucket_bets_and_is_created() {
        let mut agent = greedy_agent(QTable::new());
        assert_eq!(agent.decide(0.62), Action::Bet);
        assert_eq!(agent.table().get("0.6"), Some(&[0.0, 0.0]));
    }

    #[test]
    fn learn_moves_toward_reward() {
        let mut agent = greedy_agent(QTable::new());
        let q = agent.learn(0.7, Action::Bet, -100.0).unwrap();
        assert!((q + 10.0).abs() < 1e-12);
        assert_eq!(agent.decide(0.7), Action::Skip);
        assert_eq!(agent.store().saves(), 1);
    }

    struct FailingStore;

    impl PolicyStore for FailingStore {
        fn load(&self) -> Result<QTable, PolicyError> {
            Ok(QTable::new())
        }
        fn save(&mut self, _: &QTable) -> Result<(), PolicyError> {
            Err(PolicyError::Write {
                path: PathBuf::from("nowhere"),
                source: io::Error::other("disk full"),
            })
        }
        fn reset(&mut self) -> Result<(), PolicyError> {
            Ok(())
        }
    }

    #[test]
    fn failed_save_restores_previous_value() {
        let cfg = PolicyConfig {
            epsilon: 0.0,
            ..PolicyConfig::default()
        };
        let mut agent = BetPolicyAgent::new(FailingStore, cfg).unwrap();
        assert!(agent.learn(0.7, Action::Bet, 50.0).is_err());
        assert!(agent.table().get("0.7").is_none());
    }
}
