use paper_punter::value_filter::{ValueFilter, accept, implied_probability};

#[test]
fn accepts_exactly_when_confidence_clears_implied_plus_margin() {
    let margins = [0.0, 0.02, 0.05, 0.1];
    for m in margins {
        for odds_step in 1..=60 {
            let odds = 1.0 + odds_step as f64 * 0.25;
            for c_step in 0..=100 {
                let c = c_step as f64 / 100.0;
                let expected = c >= 1.0 / odds + m;
                assert_eq!(accept(c, odds, m), expected, "c={c} o={odds} m={m}");
            }
        }
    }
}

#[test]
fn prices_at_or_below_one_are_never_accepted() {
    for odds in [1.0, 0.99, 0.0, -3.0, f64::NAN, f64::INFINITY] {
        assert!(!accept(1.0, odds, 0.0), "odds={odds}");
        assert!(implied_probability(odds).is_none(), "odds={odds}");
    }
}

#[test]
fn favourite_scenario() {
    let filter = ValueFilter::default();
    let implied = implied_probability(1.5).unwrap();
    assert!((implied - 0.6667).abs() < 1e-4);
    assert!(!filter.accept(0.70, 1.5));
    assert!(filter.accept(0.80, 1.5));
}
