mod common;

use std::cell::RefCell;

use anyhow::Result;
use paper_punter::artifact::{ARTIFACT_FORMAT, ModelArtifact};
use paper_punter::classifier::{OutcomeClassifier, SoftmaxParams};
use paper_punter::domain::{BetResult, Match, Outcome, Score};
use paper_punter::encoder::TeamEncoder;
use paper_punter::features::{FEATURE_COUNT, FeatureEngineer};
use paper_punter::notifier::Notifier;
use paper_punter::paper_trade::{PaperTradeConfig, PaperTrader};
use paper_punter::policy::{BetPolicyAgent, MemoryPolicyStore, PolicyConfig, QTable};
use paper_punter::store::{BetStore, MatchStore, SqliteStore};
use paper_punter::value_filter::ValueFilter;

use common::{date, played, scheduled};

#[derive(Default)]
struct Recorder {
    sent: RefCell<Vec<String>>,
}

impl Notifier for Recorder {
    fn send(&self, message: &str) -> Result<()> {
        self.sent.borrow_mut().push(message.to_string());
        Ok(())
    }
}

struct Offline;

impl Notifier for Offline {
    fn send(&self, _: &str) -> Result<()> {
        anyhow::bail!("network unreachable")
    }
}

const TEAMS: [&str; 6] = ["Lens", "Lille", "Lyon", "Marseille", "Nice", "Reims"];

/// Ignores features and always says Home with probability `home`.
fn fixed_home_classifier(home: f64) -> OutcomeClassifier {
    let rest = (1.0 - home) / 2.0;
    OutcomeClassifier::from_artifact(ModelArtifact {
        format: ARTIFACT_FORMAT,
        model_version: "fixed".to_string(),
        trained_at: "2024-01-01T00:00:00Z".to_string(),
        form_window: 5,
        encoder: TeamEncoder::fit(TEAMS),
        params: SoftmaxParams {
            feature_means: [0.0; FEATURE_COUNT],
            feature_stds: [1.0; FEATURE_COUNT],
            weights: [[0.0; FEATURE_COUNT]; 3],
            bias: [home.ln(), rest.ln(), rest.ln()],
        },
    })
}

fn greedy_agent(table: QTable) -> BetPolicyAgent<MemoryPolicyStore> {
    let cfg = PolicyConfig {
        epsilon: 0.0,
        seed: Some(3),
        ..PolicyConfig::default()
    };
    BetPolicyAgent::new(MemoryPolicyStore::with_table(table), cfg).unwrap()
}

fn trader<N: Notifier>(
    store: SqliteStore,
    home_confidence: f64,
    table: QTable,
    notifier: N,
) -> PaperTrader<SqliteStore, MemoryPolicyStore, N> {
    PaperTrader::new(
        store,
        fixed_home_classifier(home_confidence),
        FeatureEngineer::default(),
        greedy_agent(table),
        notifier,
        PaperTradeConfig {
            stake: 100.0,
            filter: ValueFilter::default(),
            model_version: "V3-Champion".to_string(),
        },
    )
}

fn store_with(fixtures: &[Match]) -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_matches(fixtures).unwrap();
    store
}

#[test]
fn thin_edge_creates_no_bet() {
    let fixture = scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0));
    let mut t = trader(store_with(&[fixture]), 0.70, QTable::new(), Recorder::default());

    let summary = t.place_new_bets(date(2024, 9, 13)).unwrap();
    assert_eq!(summary.considered, 1);
    assert_eq!(summary.placed, 0);
    assert_eq!(summary.skips.no_value, 1);
    assert!(t.store().list_bets().unwrap().is_empty());
    assert!(t.notifier().sent.borrow().is_empty());
}

#[test]
fn value_edge_reaches_policy_and_places() {
    let fixture = scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0));
    let mut t = trader(store_with(&[fixture.clone()]), 0.80, QTable::new(), Recorder::default());

    let summary = t.place_new_bets(date(2024, 9, 13)).unwrap();
    assert_eq!(summary.placed, 1);

    let bets = t.store().list_bets().unwrap();
    assert_eq!(bets.len(), 1);
    let bet = &bets[0];
    assert_eq!(bet.match_id, fixture.id);
    assert_eq!(bet.prediction, Outcome::Home);
    assert_eq!(bet.odds_taken, 1.5);
    assert_eq!(bet.stake, 100.0);
    assert_eq!(bet.result, BetResult::Pending);
    assert_eq!(bet.bet_date, date(2024, 9, 13));
    assert_eq!(bet.model_version, "V3-Champion");
    assert!((bet.confidence - 0.8).abs() < 1e-9);

    let sent = t.notifier().sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Marseille vs Reims"));
}

#[test]
fn repeated_placement_never_duplicates() {
    let fixtures = vec![
        scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0)),
        scheduled(date(2024, 9, 15), "Lyon", "Nice", (1.4, 4.5, 7.0)),
    ];
    let mut t = trader(store_with(&fixtures), 0.85, QTable::new(), Recorder::default());

    assert_eq!(t.place_new_bets(date(2024, 9, 13)).unwrap().placed, 2);
    for _ in 0..3 {
        let again = t.place_new_bets(date(2024, 9, 13)).unwrap();
        assert_eq!(again.considered, 0);
        assert_eq!(again.placed, 0);
    }
    assert_eq!(t.store().list_bets().unwrap().len(), 2);
}

#[test]
fn unknown_teams_and_missing_prices_are_skipped() {
    let fixtures = vec![
        scheduled(date(2024, 9, 14), "Marseille", "Atlantis", (1.5, 4.0, 6.0)),
        scheduled(date(2024, 9, 14), "Lyon", "Nice", (1.5, 0.0, 6.0)),
    ];
    let mut t = trader(store_with(&fixtures), 0.85, QTable::new(), Recorder::default());

    let summary = t.place_new_bets(date(2024, 9, 13)).unwrap();
    assert_eq!(summary.placed, 0);
    assert_eq!(summary.skips.unknown_team, 1);
    assert_eq!(summary.skips.no_market, 1);
}

#[test]
fn losing_bucket_is_skipped_by_the_policy() {
    let mut table = QTable::new();
    table.insert("0.8".to_string(), [0.0, -40.0]);
    let fixture = scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0));
    let mut t = trader(store_with(&[fixture]), 0.80, table, Recorder::default());

    let summary = t.place_new_bets(date(2024, 9, 13)).unwrap();
    assert_eq!(summary.placed, 0);
    assert_eq!(summary.skips.policy_skip, 1);
}

#[test]
fn settlement_closes_the_bet_then_learns() {
    let fixture = scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0));
    let mut t = trader(store_with(&[fixture.clone()]), 0.80, QTable::new(), Recorder::default());
    t.place_new_bets(date(2024, 9, 13)).unwrap();

    // No result yet.
    let waiting = t.check_results().unwrap();
    assert_eq!(waiting.settled, 0);
    assert_eq!(waiting.awaiting, 1);
    assert_eq!(t.agent().store().saves(), 0);

    let result = played(fixture.date, "Marseille", "Reims", 2, 1, (1.5, 4.0, 6.0));
    t.store_mut().upsert_match(&result).unwrap();

    let summary = t.check_results().unwrap();
    assert_eq!(summary.settled, 1);
    assert_eq!(summary.wins, 1);
    assert!((summary.profit - 50.0).abs() < 1e-9);
    assert!(summary.notified);

    let bet = &t.store().list_bets().unwrap()[0];
    assert_eq!(bet.result, BetResult::Win);
    assert!((bet.profit.unwrap() - 50.0).abs() < 1e-9);
    assert!((t.agent().q_values(0.8)[1] - 5.0).abs() < 1e-9);
    assert_eq!(t.agent().store().saves(), 1);

    // Settled bets are not revisited.
    let again = t.check_results().unwrap();
    assert_eq!(again.settled, 0);
    assert_eq!(t.agent().store().saves(), 1);

    let sent = t.notifier().sent.borrow();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("+50.00"));
}

#[test]
fn lost_bet_is_settled_with_negative_profit() {
    let fixtures = vec![
        scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0)),
        scheduled(date(2024, 9, 21), "Lyon", "Lens", (1.5, 4.0, 6.0)),
    ];
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_match(&fixtures[0]).unwrap();
    let mut t = trader(store, 0.80, QTable::new(), Recorder::default());
    assert_eq!(t.place_new_bets(date(2024, 9, 13)).unwrap().placed, 1);

    t.store_mut()
        .upsert_match(&played(fixtures[0].date, "Marseille", "Reims", 0, 1, (1.5, 4.0, 6.0)))
        .unwrap();
    let summary = t.check_results().unwrap();
    assert_eq!(summary.losses, 1);
    assert!((summary.profit + 100.0).abs() < 1e-9);
    assert!((t.agent().q_values(0.8)[1] + 10.0).abs() < 1e-9);

    // Next fixture in the same bucket is now declined.
    t.store_mut().upsert_match(&fixtures[1]).unwrap();
    let next = t.place_new_bets(date(2024, 9, 20)).unwrap();
    assert_eq!(next.placed, 0);
    assert_eq!(next.skips.policy_skip, 1);
    assert_eq!(t.store().list_bets().unwrap()[0].result, BetResult::Lose);
}

#[test]
fn notification_failures_do_not_stop_placement() {
    let fixtures = vec![
        scheduled(date(2024, 9, 14), "Marseille", "Reims", (1.5, 4.0, 6.0)),
        scheduled(date(2024, 9, 15), "Lyon", "Nice", (1.4, 4.5, 7.0)),
    ];
    let mut t = trader(store_with(&fixtures), 0.85, QTable::new(), Offline);
    let summary = t.place_new_bets(date(2024, 9, 13)).unwrap();
    assert_eq!(summary.placed, 2);
    assert_eq!(summary.notify_failures, 2);

    for f in &fixtures {
        let score = Score { home: 1, away: 0 };
        let mut done = f.clone();
        done.score = Some(score);
        t.store_mut().upsert_match(&done).unwrap();
    }
    let settled = t.check_results().unwrap();
    assert_eq!(settled.settled, 2);
    assert!(!settled.notified);
}
