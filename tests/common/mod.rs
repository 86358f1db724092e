#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use paper_punter::domain::{MarketOdds, Match, Score};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn played(day: NaiveDate, home: &str, away: &str, hg: u32, ag: u32, odds: (f64, f64, f64)) -> Match {
    Match::new(
        day,
        home,
        away,
        MarketOdds::new(odds.0, odds.1, odds.2),
        Some(Score { home: hg, away: ag }),
    )
}

pub fn scheduled(day: NaiveDate, home: &str, away: &str, odds: (f64, f64, f64)) -> Match {
    Match::new(day, home, away, MarketOdds::new(odds.0, odds.1, odds.2), None)
}

pub fn team_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Club {:02}", i)).collect()
}

/// Round-robin league with strength-driven goals and bookmaker-style prices.
/// One round per week starting 2021-08-07; every team plays once per round.
pub fn synthetic_league(teams: usize, rounds: usize, seed: u64) -> Vec<Match> {
    let names = team_names(teams);
    let strength: Vec<f64> = (0..teams)
        .map(|i| -1.0 + 2.0 * i as f64 / (teams.max(2) - 1) as f64)
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let start = date(2021, 8, 7);
    let mut out = Vec::new();

    for round in 0..rounds {
        let day = start + Duration::days(7 * round as i64);
        for (h, a) in round_robin_pairs(teams, round) {
            let diff = strength[h] - strength[a];
            let lambda_home = (1.45 + 0.6 * diff).max(0.2);
            let lambda_away = (1.15 - 0.6 * diff).max(0.2);
            let hg = poisson(&mut rng, lambda_home);
            let ag = poisson(&mut rng, lambda_away);
            out.push(played(day, &names[h], &names[a], hg, ag, prices(diff)));
        }
    }
    out
}

/// Circle-method pairing; the home side alternates by round.
fn round_robin_pairs(teams: usize, round: usize) -> Vec<(usize, usize)> {
    let n = teams - teams % 2;
    let mut ring: Vec<usize> = (1..n).collect();
    ring.rotate_left(round % (n - 1));
    let mut order = vec![0];
    order.extend(ring);
    (0..n / 2)
        .map(|i| {
            let (x, y) = (order[i], order[n - 1 - i]);
            if round % 2 == 0 { (x, y) } else { (y, x) }
        })
        .collect()
}

fn prices(diff: f64) -> (f64, f64, f64) {
    let p_home = (0.45 + 0.25 * diff).clamp(0.1, 0.8);
    let p_draw = 0.26;
    let p_away = (1.0 - p_home - p_draw).max(0.05);
    let total = p_home + p_draw + p_away;
    let book = |p: f64| ((total / p) / 1.05 * 100.0).round() / 100.0;
    (book(p_home), book(p_draw), book(p_away))
}

fn poisson(rng: &mut StdRng, lambda: f64) -> u32 {
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.gen_range(0.0..1.0);
        if p <= limit || k >= 10 {
            return k;
        }
        k += 1;
    }
}
