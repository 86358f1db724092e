//! football-data.co.uk season files -> validated [`Match`] records.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::domain::{MarketOdds, Match, Score};
use crate::http_client::fetch_text;
use crate::store::MatchStore;

const BASE_URL: &str = "https://www.football-data.co.uk/mmz4281";

/// Month in which a new season is considered started.
const SEASON_START_MONTH: u32 = 7;

/// One URL per season from `first_season` up to the season running on `today`.
pub fn season_urls(league_code: &str, first_season: i32, today: NaiveDate) -> Vec<String> {
    let current = if today.month() >= SEASON_START_MONTH {
        today.year()
    } else {
        today.year() - 1
    };
    (first_season..=current)
        .map(|year| {
            format!(
                "{BASE_URL}/{:02}{:02}/{league_code}.csv",
                year.rem_euclid(100),
                (year + 1).rem_euclid(100)
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRows {
    pub matches: Vec<Match>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    home: usize,
    away: usize,
    home_goals: Option<usize>,
    away_goals: Option<usize>,
    odds: [[Option<usize>; 3]; 2],
}

impl Columns {
    fn from_header(header: &str) -> Option<Self> {
        let index: HashMap<&str, usize> = split_row(header)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();
        let col = |name: &str| index.get(name).copied();
        Some(Self {
            date: col("Date")?,
            home: col("HomeTeam")?,
            away: col("AwayTeam")?,
            home_goals: col("FTHG"),
            away_goals: col("FTAG"),
            odds: [
                [col("B365H"), col("B365D"), col("B365A")],
                [col("BWH"), col("BWD"), col("BWA")],
            ],
        })
    }
}

/// Parses one season file. Rows with a bad date, a missing team, half a score
/// or an unreadable score are counted in `skipped`.
pub fn parse_football_data_csv(raw: &str) -> ParsedRows {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let Some(columns) = lines.next().and_then(Columns::from_header) else {
        warn!("season file has no usable header");
        return ParsedRows::default();
    };

    let mut out = ParsedRows::default();
    for line in lines {
        match parse_row(&columns, &split_row(line)) {
            Some(m) => out.matches.push(m),
            None => out.skipped += 1,
        }
    }
    out
}

fn split_row(line: &str) -> Vec<&str> {
    line.trim_end_matches('\r').split(',').map(str::trim).collect()
}

fn parse_row(cols: &Columns, fields: &[&str]) -> Option<Match> {
    let field = |idx: usize| fields.get(idx).copied().filter(|s| !s.is_empty());
    let date = parse_date(field(cols.date)?)?;
    let home = field(cols.home)?;
    let away = field(cols.away)?;

    let home_goals = cols.home_goals.and_then(field);
    let away_goals = cols.away_goals.and_then(field);
    let score = match (home_goals, away_goals) {
        (Some(h), Some(a)) => Some(Score {
            home: parse_goals(h)?,
            away: parse_goals(a)?,
        }),
        (None, None) => None,
        _ => return None,
    };

    let mut prices = [0.0_f64; 3];
    for (leg, price) in prices.iter_mut().enumerate() {
        *price = cols
            .odds
            .iter()
            .filter_map(|bookmaker| bookmaker[leg].and_then(field))
            .find_map(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
    }

    Some(Match::new(
        date,
        home,
        away,
        MarketOdds::new(prices[0], prices[1], prices[2]),
        score,
    ))
}

/// `dd/mm/yy` or `dd/mm/yyyy`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let fmt = if raw.len() == 8 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(raw, fmt).ok()
}

fn parse_goals(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    // Some exports write goals as floats ("2.0").
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u32)
}

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub matches: Vec<Match>,
    pub seasons_ok: usize,
    pub skipped_rows: usize,
    pub errors: Vec<String>,
}

/// Downloads season files concurrently. One failing URL is recorded and the
/// rest still count. Output order follows `urls`.
pub fn fetch_seasons(client: &Client, urls: &[String]) -> FetchSummary {
    let results: Vec<(String, Result<ParsedRows>)> = urls
        .par_iter()
        .map(|url| {
            let parsed = fetch_text(client, url).map(|body| parse_football_data_csv(&body));
            (url.clone(), parsed)
        })
        .collect();

    let mut summary = FetchSummary::default();
    for (url, result) in results {
        match result {
            Ok(parsed) => {
                info!(url = %url, rows = parsed.matches.len(), skipped = parsed.skipped, "season fetched");
                summary.seasons_ok += 1;
                summary.skipped_rows += parsed.skipped;
                summary.matches.extend(parsed.matches);
            }
            Err(err) => {
                warn!(url = %url, "season unavailable: {err:#}");
                summary.errors.push(format!("{url}: {err:#}"));
            }
        }
    }
    summary
}

#[derive(Debug)]
pub struct IngestSummary {
    pub seasons_total: usize,
    pub seasons_ok: usize,
    pub matches_upserted: usize,
    pub skipped_rows: usize,
    pub errors: Vec<String>,
}

/// Fetches every season and upserts the validated rows in one transaction.
pub fn ingest_seasons<S: MatchStore + ?Sized>(
    store: &mut S,
    client: &Client,
    urls: &[String],
) -> Result<IngestSummary> {
    let fetched = fetch_seasons(client, urls);
    let matches_upserted = store.upsert_matches(&fetched.matches)?;
    Ok(IngestSummary {
        seasons_total: urls.len(),
        seasons_ok: fetched.seasons_ok,
        matches_upserted,
        skipped_rows: fetched.skipped_rows,
        errors: fetched.errors,
    })
}
