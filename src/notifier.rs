use std::env;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{BetResult, Match, Outcome};

const TELEGRAM_API: &str = "https://api.telegram.org";

pub trait Notifier {
    fn send(&self, message: &str) -> Result<()>;
}

/// Writes messages to the log. Used when no chat credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str) -> Result<()> {
        info!(target: "notify", "{message}");
        Ok(())
    }
}

pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// `None` unless both `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID` are set.
    pub fn from_env(client: Client) -> Option<Self> {
        let token = non_empty_env("TELEGRAM_TOKEN")?;
        let chat_id = non_empty_env("TELEGRAM_CHAT_ID")?;
        Some(Self::new(client, token, chat_id))
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> Result<()> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.token);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "Markdown",
            }))
            .send()
            .context("telegram request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            anyhow::bail!("telegram returned HTTP {status}: {body}");
        }
        Ok(())
    }
}

/// Picks Telegram when credentials are present, the log otherwise.
pub fn notifier_from_env(client: Client) -> Box<dyn Notifier> {
    match TelegramNotifier::from_env(client) {
        Some(telegram) => Box::new(telegram),
        None => {
            info!("telegram credentials not set; notifications go to the log");
            Box::new(LogNotifier)
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn send(&self, message: &str) -> Result<()> {
        (**self).send(message)
    }
}

/// Delivery failures never stop the caller; they are logged and reported as `false`.
pub fn notify_best_effort<N: Notifier + ?Sized>(notifier: &N, message: &str) -> bool {
    match notifier.send(message) {
        Ok(()) => true,
        Err(err) => {
            warn!("notification failed: {err:#}");
            false
        }
    }
}

pub fn placement_message(fixture: &Match, pick: Outcome, odds_taken: f64, confidence: f64) -> String {
    format!(
        "*NEW BET*\n{} vs {}\n{} @ {:.2}\nConfidence: {:.2}",
        escape_markdown(&fixture.home_team),
        escape_markdown(&fixture.away_team),
        pick,
        odds_taken,
        confidence
    )
}

/// Backslash-escapes the characters Telegram's `Markdown` parse mode treats as entities.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub struct SettlementLine<'a> {
    pub fixture: &'a Match,
    pub pick: Outcome,
    pub result: BetResult,
    pub profit: f64,
}

pub fn settlement_report(lines: &[SettlementLine<'_>]) -> String {
    let mut out = String::from("*RESULTS*\n\n");
    let mut total = 0.0;
    for line in lines {
        let icon = if line.result == BetResult::Win { "✅" } else { "❌" };
        out.push_str(&format!(
            "{icon} {} ({})\n{:+.2}\n\n",
            escape_markdown(&line.fixture.label()),
            line.pick,
            line.profit
        ));
        total += line.profit;
    }
    out.push_str(&format!("Net: {total:+.2}"));
    out
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
