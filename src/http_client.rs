use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

const AGENT: &str = "paper-punter/0.1";

/// Built once per binary run and passed to whatever needs the network.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .context("failed to build http client")
}

pub fn default_http_client() -> Result<Client> {
    build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))
}

/// GET `url` and return the body; non-2xx statuses are errors.
pub fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .header(USER_AGENT, AGENT)
        .send()
        .with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("{url} returned HTTP {status}");
    }
    resp.text().with_context(|| format!("read body failed: {url}"))
}
