//! End-to-end reconciliation behavior over the public API.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use heatmap_engine::application::services::reconciler::{BaselineBook, reconcile};
use heatmap_engine::{HeatmapSnapshot, SecurityMetadata, TradeTick};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap()
}

fn universe() -> Vec<SecurityMetadata> {
    vec![
        SecurityMetadata {
            symbol: "AAPL".into(),
            name: "Apple Inc".into(),
            sector: "technology".into(),
            exchange: "NASDAQ".into(),
            market_cap: Some(dec!(3_000_000_000_000)),
        },
        SecurityMetadata {
            symbol: "MSFT".into(),
            name: "Microsoft Corp".into(),
            sector: "technology".into(),
            exchange: "NASDAQ".into(),
            market_cap: Some(dec!(2_800_000_000_000)),
        },
        SecurityMetadata {
            symbol: "JPM".into(),
            name: "JPMorgan Chase".into(),
            sector: "financials".into(),
            exchange: "NYSE".into(),
            market_cap: Some(dec!(600_000_000_000)),
        },
        SecurityMetadata {
            symbol: "XOM".into(),
            name: "Exxon Mobil".into(),
            sector: "energy".into(),
            exchange: "NYSE".into(),
            market_cap: None,
        },
    ]
}

fn ticks(entries: &[(&str, Decimal)]) -> HashMap<String, TradeTick> {
    entries
        .iter()
        .map(|(symbol, price)| ((*symbol).to_owned(), TradeTick::new(symbol, *price, now())))
        .collect()
}

#[test]
fn skeleton_groups_by_sector_and_dedupes() {
    let mut meta = universe();
    // Duplicate row for AAPL must not produce two views.
    meta.push(meta[0].clone());

    let snapshot = HeatmapSnapshot::skeleton(&meta, now());

    assert_eq!(snapshot.total_stocks, 4);
    let sector_names: Vec<&str> = snapshot.sectors.iter().map(|s| s.sector.as_str()).collect();
    assert_eq!(sector_names, ["energy", "financials", "technology"]);

    let tech = &snapshot.sectors[2];
    assert_eq!(tech.name, "Technology");
    assert_eq!(tech.stocks.len(), 2);
}

#[test]
fn full_reconcile_derives_changes_against_frozen_baselines() {
    let skeleton = HeatmapSnapshot::skeleton(&universe(), now());

    let mut baselines = BaselineBook::new();
    baselines.install_reference("AAPL", dec!(50));
    baselines.install_reference("MSFT", dec!(400));
    baselines.install_reference("JPM", dec!(250));

    let ticks = ticks(&[("AAPL", dec!(55)), ("MSFT", dec!(390)), ("JPM", dec!(250))]);
    let volumes = HashMap::from([
        ("AAPL".to_owned(), 1_000_000u64),
        ("MSFT".to_owned(), 3_000_000u64),
    ]);

    let snapshot = reconcile(&skeleton, &ticks, &volumes, &baselines, now());

    let tech = &snapshot.sectors[2];
    // Volume-descending within the sector.
    assert_eq!(tech.stocks[0].ticker, "MSFT");
    assert_eq!(tech.stocks[1].ticker, "AAPL");

    let aapl = &tech.stocks[1];
    assert_eq!(aapl.change_percent, dec!(10));
    let msft = &tech.stocks[0];
    assert_eq!(msft.change_percent, dec!(-2.5));

    // Sector average over both qualified stocks.
    assert_eq!(tech.avg_change, dec!(3.75));

    // Flat stock keeps exact zero.
    let jpm = &snapshot.sectors[1].stocks[0];
    assert_eq!(jpm.change_percent, Decimal::ZERO);
}

#[test]
fn baselines_survive_later_reference_arrivals() {
    let skeleton = HeatmapSnapshot::skeleton(&universe(), now());
    let mut baselines = BaselineBook::new();

    // Tick arrives before the backfill lands.
    let first_ticks = ticks(&[("AAPL", dec!(50))]);
    for tick in first_ticks.values() {
        baselines.observe_tick(tick);
    }
    let _ = reconcile(&skeleton, &first_ticks, &HashMap::new(), &baselines, now());

    // Late backfill must not re-anchor AAPL.
    baselines.install_reference("AAPL", dec!(48));

    let later_ticks = ticks(&[("AAPL", dec!(55))]);
    let snapshot = reconcile(&skeleton, &later_ticks, &HashMap::new(), &baselines, now());

    let aapl = snapshot.sectors[2]
        .stocks
        .iter()
        .find(|s| s.ticker == "AAPL")
        .unwrap();
    // Change stays anchored to the frozen 50; the displayed close is
    // the real prior-session 48.
    assert_eq!(aapl.previous_close, Some(dec!(48)));
    assert_eq!(aapl.change_percent, dec!(10));
}

#[test]
fn every_view_keeps_a_positive_size() {
    let skeleton = HeatmapSnapshot::skeleton(&universe(), now());
    let snapshot = reconcile(
        &skeleton,
        &HashMap::new(),
        &HashMap::new(),
        &BaselineBook::new(),
        now(),
    );

    for sector in &snapshot.sectors {
        for stock in &sector.stocks {
            assert!(stock.size >= 1.0, "{} has size {}", stock.ticker, stock.size);
            assert!(stock.size.is_finite());
        }
    }
}

#[test]
fn repeated_reconciles_with_identical_inputs_are_stable() {
    let skeleton = HeatmapSnapshot::skeleton(&universe(), now());
    let mut baselines = BaselineBook::new();
    baselines.install_reference("AAPL", dec!(50));
    let ticks = ticks(&[("AAPL", dec!(51))]);
    let volumes = HashMap::from([("AAPL".to_owned(), 42u64)]);

    let first = reconcile(&skeleton, &ticks, &volumes, &baselines, now());
    let second = reconcile(&first, &ticks, &volumes, &baselines, now());
    let third = reconcile(&second, &ticks, &volumes, &baselines, now());

    assert_eq!(first, second);
    assert_eq!(second, third);
}
