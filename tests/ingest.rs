mod common;

use std::path::PathBuf;

use paper_punter::domain::{MatchStatus, Score};
use paper_punter::ingest::{parse_football_data_csv, season_urls};
use paper_punter::store::{MatchStore, SqliteStore};

use common::date;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_sample() -> String {
    std::fs::read_to_string(fixture_path("F1_sample.csv")).unwrap()
}

#[test]
fn sample_season_keeps_valid_rows_and_counts_the_rest() {
    let parsed = parse_football_data_csv(&load_sample());
    assert_eq!(parsed.matches.len(), 6);
    assert_eq!(parsed.skipped, 4);

    let ids: Vec<&str> = parsed.matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "2023-08-11_Nice_Lille",
            "2023-08-12_Marseille_Reims",
            "2023-08-12_ParisSG_Lorient",
            "2023-08-13_Brest_Lens",
            "2023-08-13_Clermont_Monaco",
            "2023-08-20_Strasbourg_Lyon",
        ]
    );
}

#[test]
fn scores_status_and_prices_are_validated() {
    let parsed = parse_football_data_csv(&load_sample());
    let by_id = |id: &str| parsed.matches.iter().find(|m| m.id == id).unwrap();

    let marseille = by_id("2023-08-12_Marseille_Reims");
    assert_eq!(marseille.score, Some(Score { home: 2, away: 1 }));
    assert_eq!(marseille.status(), MatchStatus::Finished);
    assert_eq!((marseille.odds.home, marseille.odds.draw, marseille.odds.away), (1.5, 4.2, 6.0));

    let psg = by_id("2023-08-12_ParisSG_Lorient");
    assert_eq!(psg.date, date(2023, 8, 12));
    assert_eq!(psg.home_team, "Paris SG");

    // B365 missing, BW present.
    let brest = by_id("2023-08-13_Brest_Lens");
    assert_eq!(brest.odds.home, 3.1);
    assert!(brest.odds.is_complete());

    let clermont = by_id("2023-08-13_Clermont_Monaco");
    assert!(!clermont.odds.is_complete());
    assert_eq!(clermont.odds.home, 0.0);

    let upcoming = by_id("2023-08-20_Strasbourg_Lyon");
    assert_eq!(upcoming.status(), MatchStatus::Scheduled);
    assert!(upcoming.score.is_none());
}

#[test]
fn parsed_rows_land_in_the_store() {
    let parsed = parse_football_data_csv(&load_sample());
    let mut store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.upsert_matches(&parsed.matches).unwrap(), 6);
    // Re-ingesting the same file is idempotent.
    store.upsert_matches(&parsed.matches).unwrap();

    assert_eq!(store.list_matches(None).unwrap().len(), 6);
    assert_eq!(store.list_matches(Some(MatchStatus::Finished)).unwrap().len(), 5);
    let scheduled = store.list_matches(Some(MatchStatus::Scheduled)).unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].home_team, "Strasbourg");
}

#[test]
fn header_without_required_columns_yields_nothing() {
    let parsed = parse_football_data_csv("Div,Date,Home,Away\nF1,11/08/2023,Nice,Lille\n");
    assert!(parsed.matches.is_empty());
}

#[test]
fn season_list_runs_from_first_season_to_current() {
    let urls = season_urls("E0", 2022, date(2025, 10, 1));
    assert_eq!(
        urls,
        vec![
            "https://www.football-data.co.uk/mmz4281/2223/E0.csv",
            "https://www.football-data.co.uk/mmz4281/2324/E0.csv",
            "https://www.football-data.co.uk/mmz4281/2425/E0.csv",
            "https://www.football-data.co.uk/mmz4281/2526/E0.csv",
        ]
    );
    assert!(season_urls("F1", 2030, date(2025, 10, 1)).is_empty());
}
