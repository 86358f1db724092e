use std::env;
use std::path::PathBuf;

use crate::features::DEFAULT_WINDOW;
use crate::persist::app_data_dir;
use crate::policy::{DEFAULT_ALPHA, DEFAULT_EPSILON, DEFAULT_GAMMA, PolicyConfig};
use crate::value_filter::DEFAULT_MARGIN;

pub const DEFAULT_MODEL_VERSION: &str = "V3-Champion";
pub const DEFAULT_STAKE: f64 = 100.0;
pub const DEFAULT_BACKTEST_SPLIT: usize = 400;
pub const DEFAULT_LEAGUE_CODE: &str = "F1";
pub const DEFAULT_FIRST_SEASON: i32 = 2021;

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub model_version: String,
    pub stake: f64,
    pub value_margin: f64,
    pub form_window: usize,
    pub policy: PolicyConfig,
    pub backtest_split: usize,
    pub league_code: String,
    pub first_season: i32,
}

impl Settings {
    pub fn from_env() -> Self {
        let data_dir = env_string("PUNTER_DATA_DIR")
            .map(PathBuf::from)
            .or_else(app_data_dir)
            .unwrap_or_else(|| PathBuf::from("data"));
        let db_path = env_string("PUNTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("betting.sqlite"));

        let policy = PolicyConfig {
            alpha: env_f64("PUNTER_RL_ALPHA", DEFAULT_ALPHA).clamp(0.0, 1.0),
            gamma: env_f64("PUNTER_RL_GAMMA", DEFAULT_GAMMA).clamp(0.0, 1.0),
            epsilon: env_f64("PUNTER_RL_EPSILON", DEFAULT_EPSILON).clamp(0.0, 1.0),
            seed: env_string("PUNTER_RL_SEED").and_then(|v| v.parse::<u64>().ok()),
        };

        Self {
            model_version: env_string("PUNTER_MODEL_VERSION")
                .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
            stake: env_f64("PUNTER_STAKE", DEFAULT_STAKE).clamp(0.01, 1e6),
            value_margin: env_f64("PUNTER_VALUE_MARGIN", DEFAULT_MARGIN).clamp(0.0, 0.5),
            form_window: env_usize("PUNTER_FORM_WINDOW", DEFAULT_WINDOW).clamp(1, 38),
            policy,
            backtest_split: env_usize("PUNTER_BACKTEST_SPLIT", DEFAULT_BACKTEST_SPLIT),
            league_code: env_string("PUNTER_LEAGUE_CODE")
                .unwrap_or_else(|| DEFAULT_LEAGUE_CODE.to_string()),
            first_season: env_string("PUNTER_FIRST_SEASON")
                .and_then(|v| v.parse::<i32>().ok())
                .unwrap_or(DEFAULT_FIRST_SEASON)
                .clamp(1993, 2100),
            data_dir,
            db_path,
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    pub fn policy_path(&self) -> PathBuf {
        self.data_dir.join("q_table.json")
    }

    /// Kept apart from the live table so a replay never overwrites it.
    pub fn backtest_policy_path(&self) -> PathBuf {
        self.data_dir.join("q_table_backtest.json")
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_string(key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_string(key)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
