use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

use crate::domain::{Bet, BetResult, MarketOdds, Match, MatchStatus, NewBet, Outcome, Score};

const DATE_FMT: &str = "%Y-%m-%d";

pub trait MatchStore {
    /// Ordered by date, then id. `None` lists every status.
    fn list_matches(&self, status: Option<MatchStatus>) -> Result<Vec<Match>>;
    fn upsert_match(&mut self, m: &Match) -> Result<()>;
    /// One transaction; returns the number of rows written.
    fn upsert_matches(&mut self, matches: &[Match]) -> Result<usize>;
}

/// A pending bet joined with its fixture as currently stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBet {
    pub bet: Bet,
    pub fixture: Match,
}

pub trait BetStore {
    fn list_pending_bets_with_match(&self) -> Result<Vec<PendingBet>>;
    fn list_scheduled_matches_without_bet(&self) -> Result<Vec<Match>>;
    /// `Ok(None)` when the match already has a bet; nothing is written then.
    fn insert_bet(&mut self, bet: &NewBet) -> Result<Option<i64>>;
    /// Moves a PENDING bet to its final result. Fails if the bet is not pending.
    fn settle_bet(&mut self, bet_id: i64, result: BetResult, profit: f64) -> Result<()>;
    fn list_bets(&self) -> Result<Vec<Bet>>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable sqlite wal")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn bet_for_match(&self, match_id: &str) -> Result<Option<Bet>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {BET_COLUMNS} FROM bets b WHERE b.match_id = ?1"),
                params![match_id],
                raw_bet,
            )
            .optional()
            .context("query bet by match")?;
        Ok(raw.and_then(decode_bet))
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_odds REAL NOT NULL DEFAULT 0,
            draw_odds REAL NOT NULL DEFAULT 0,
            away_odds REAL NOT NULL DEFAULT 0,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_status_date ON matches(status, date);

        CREATE TABLE IF NOT EXISTS bets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id TEXT NOT NULL UNIQUE REFERENCES matches(id),
            prediction TEXT NOT NULL,
            confidence REAL NOT NULL,
            stake REAL NOT NULL,
            odds_taken REAL NOT NULL,
            result TEXT NOT NULL DEFAULT 'PENDING',
            profit REAL NULL,
            bet_date TEXT NOT NULL,
            model_version TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bets_result ON bets(result);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

const MATCH_COLUMNS: &str = "m.id, m.date, m.home_team, m.away_team, m.home_odds, m.draw_odds, \
     m.away_odds, m.home_score, m.away_score, m.status";

const BET_COLUMNS: &str = "b.id, b.match_id, b.prediction, b.confidence, b.stake, b.odds_taken, \
     b.result, b.profit, b.bet_date, b.model_version";

struct RawMatch {
    id: String,
    date: String,
    home_team: String,
    away_team: String,
    odds: [f64; 3],
    home_score: Option<i64>,
    away_score: Option<i64>,
    status: String,
}

struct RawBet {
    id: i64,
    match_id: String,
    prediction: String,
    confidence: f64,
    stake: f64,
    odds_taken: f64,
    result: String,
    profit: Option<f64>,
    bet_date: String,
    model_version: String,
}

fn raw_match_at(row: &Row<'_>, base: usize) -> rusqlite::Result<RawMatch> {
    Ok(RawMatch {
        id: row.get(base)?,
        date: row.get(base + 1)?,
        home_team: row.get(base + 2)?,
        away_team: row.get(base + 3)?,
        odds: [row.get(base + 4)?, row.get(base + 5)?, row.get(base + 6)?],
        home_score: row.get(base + 7)?,
        away_score: row.get(base + 8)?,
        status: row.get(base + 9)?,
    })
}

fn raw_bet(row: &Row<'_>) -> rusqlite::Result<RawBet> {
    Ok(RawBet {
        id: row.get(0)?,
        match_id: row.get(1)?,
        prediction: row.get(2)?,
        confidence: row.get(3)?,
        stake: row.get(4)?,
        odds_taken: row.get(5)?,
        result: row.get(6)?,
        profit: row.get(7)?,
        bet_date: row.get(8)?,
        model_version: row.get(9)?,
    })
}

/// Rejects rows that break the record invariants instead of passing nulls on.
fn decode_match(raw: RawMatch) -> Option<Match> {
    let Ok(date) = NaiveDate::parse_from_str(&raw.date, DATE_FMT) else {
        warn!(id = %raw.id, date = %raw.date, "skipping stored match with bad date");
        return None;
    };
    let score = match (raw.home_score, raw.away_score) {
        (Some(h), Some(a)) => match (u32::try_from(h), u32::try_from(a)) {
            (Ok(home), Ok(away)) => Some(Score { home, away }),
            _ => {
                warn!(id = %raw.id, "skipping stored match with negative score");
                return None;
            }
        },
        (None, None) => None,
        _ => {
            warn!(id = %raw.id, "skipping stored match with half a score");
            return None;
        }
    };
    let status = MatchStatus::parse(&raw.status);
    let consistent = matches!(
        (status, score.is_some()),
        (Some(MatchStatus::Finished), true) | (Some(MatchStatus::Scheduled), false)
    );
    if !consistent {
        warn!(id = %raw.id, status = %raw.status, "skipping stored match with inconsistent status");
        return None;
    }
    Some(Match {
        id: raw.id,
        date,
        home_team: raw.home_team,
        away_team: raw.away_team,
        odds: MarketOdds::new(raw.odds[0], raw.odds[1], raw.odds[2]),
        score,
    })
}

fn decode_bet(raw: RawBet) -> Option<Bet> {
    let prediction = Outcome::from_code(&raw.prediction);
    let result = BetResult::parse(&raw.result);
    let bet_date = NaiveDate::parse_from_str(&raw.bet_date, DATE_FMT).ok();
    let (Some(prediction), Some(result), Some(bet_date)) = (prediction, result, bet_date) else {
        warn!(bet_id = raw.id, "skipping malformed stored bet");
        return None;
    };
    Some(Bet {
        id: raw.id,
        match_id: raw.match_id,
        prediction,
        confidence: raw.confidence,
        stake: raw.stake,
        odds_taken: raw.odds_taken,
        result,
        profit: raw.profit,
        bet_date,
        model_version: raw.model_version,
    })
}

fn upsert_match_row(conn: &Connection, m: &Match) -> Result<()> {
    let (home_score, away_score) = match m.score {
        Some(s) => (Some(s.home as i64), Some(s.away as i64)),
        None => (None, None),
    };
    conn.execute(
        r#"
        INSERT INTO matches (
            id, date, home_team, away_team,
            home_odds, draw_odds, away_odds,
            home_score, away_score, status, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            home_odds = CASE WHEN excluded.home_odds > 0 THEN excluded.home_odds ELSE matches.home_odds END,
            draw_odds = CASE WHEN excluded.draw_odds > 0 THEN excluded.draw_odds ELSE matches.draw_odds END,
            away_odds = CASE WHEN excluded.away_odds > 0 THEN excluded.away_odds ELSE matches.away_odds END,
            home_score = COALESCE(excluded.home_score, matches.home_score),
            away_score = COALESCE(excluded.away_score, matches.away_score),
            status = CASE WHEN excluded.home_score IS NOT NULL THEN excluded.status ELSE matches.status END,
            updated_at = excluded.updated_at
        "#,
        params![
            m.id,
            m.date.format(DATE_FMT).to_string(),
            m.home_team,
            m.away_team,
            m.odds.home,
            m.odds.draw,
            m.odds.away,
            home_score,
            away_score,
            m.status().as_str(),
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.id))?;
    Ok(())
}

impl MatchStore for SqliteStore {
    fn list_matches(&self, status: Option<MatchStatus>) -> Result<Vec<Match>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches m \
                 WHERE (?1 IS NULL OR m.status = ?1) \
                 ORDER BY m.date ASC, m.id ASC"
            ))
            .context("prepare list matches query")?;
        let rows = stmt
            .query_map(params![status.map(MatchStatus::as_str)], |row| raw_match_at(row, 0))
            .context("query list matches")?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(m) = decode_match(row.context("decode match row")?) {
                out.push(m);
            }
        }
        Ok(out)
    }

    fn upsert_match(&mut self, m: &Match) -> Result<()> {
        upsert_match_row(&self.conn, m)
    }

    fn upsert_matches(&mut self, matches: &[Match]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin upsert transaction")?;
        for m in matches {
            upsert_match_row(&tx, m)?;
        }
        tx.commit().context("commit upsert transaction")?;
        Ok(matches.len())
    }
}

impl BetStore for SqliteStore {
    fn list_pending_bets_with_match(&self) -> Result<Vec<PendingBet>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {BET_COLUMNS}, {MATCH_COLUMNS} FROM bets b \
                 JOIN matches m ON m.id = b.match_id \
                 WHERE b.result = 'PENDING' \
                 ORDER BY m.date ASC, b.id ASC"
            ))
            .context("prepare pending bets query")?;
        let rows = stmt
            .query_map([], |row| Ok((raw_bet(row)?, raw_match_at(row, 10)?)))
            .context("query pending bets")?;

        let mut out = Vec::new();
        for row in rows {
            let (raw_bet, raw_match) = row.context("decode pending bet row")?;
            if let (Some(bet), Some(fixture)) = (decode_bet(raw_bet), decode_match(raw_match)) {
                out.push(PendingBet { bet, fixture });
            }
        }
        Ok(out)
    }

    fn list_scheduled_matches_without_bet(&self) -> Result<Vec<Match>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches m \
                 LEFT JOIN bets b ON b.match_id = m.id \
                 WHERE m.status = 'SCHEDULED' AND b.id IS NULL \
                 ORDER BY m.date ASC, m.id ASC"
            ))
            .context("prepare scheduled matches query")?;
        let rows = stmt
            .query_map([], |row| raw_match_at(row, 0))
            .context("query scheduled matches")?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(m) = decode_match(row.context("decode match row")?) {
                out.push(m);
            }
        }
        Ok(out)
    }

    fn insert_bet(&mut self, bet: &NewBet) -> Result<Option<i64>> {
        let inserted = self
            .conn
            .execute(
                r#"
                INSERT INTO bets (
                    match_id, prediction, confidence, stake, odds_taken,
                    result, profit, bet_date, model_version
                ) VALUES (?1, ?2, ?3, ?4, ?5, 'PENDING', NULL, ?6, ?7)
                ON CONFLICT(match_id) DO NOTHING
                "#,
                params![
                    bet.match_id,
                    bet.prediction.code(),
                    bet.confidence,
                    bet.stake,
                    bet.odds_taken,
                    bet.bet_date.format(DATE_FMT).to_string(),
                    bet.model_version,
                ],
            )
            .with_context(|| format!("insert bet for {}", bet.match_id))?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn settle_bet(&mut self, bet_id: i64, result: BetResult, profit: f64) -> Result<()> {
        if result == BetResult::Pending {
            return Err(anyhow!("bet {bet_id} cannot be settled back to PENDING"));
        }
        let updated = self
            .conn
            .execute(
                "UPDATE bets SET result = ?2, profit = ?3 WHERE id = ?1 AND result = 'PENDING'",
                params![bet_id, result.as_str(), profit],
            )
            .with_context(|| format!("settle bet {bet_id}"))?;
        if updated == 0 {
            return Err(anyhow!("bet {bet_id} is missing or already settled"));
        }
        Ok(())
    }

    fn list_bets(&self) -> Result<Vec<Bet>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BET_COLUMNS} FROM bets b ORDER BY b.id ASC"))
            .context("prepare list bets query")?;
        let rows = stmt.query_map([], raw_bet).context("query list bets")?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(bet) = decode_bet(row.context("decode bet row")?) {
                out.push(bet);
            }
        }
        Ok(out)
    }
}
