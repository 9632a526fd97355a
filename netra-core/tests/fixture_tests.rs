//! Fixture-driven tests - load signal files from disk and score them end to end

use chrono::{DateTime, Utc};
use netra_core::config::load_and_resolve;
use netra_core::signal::{group_by_district, load_signals};
use netra_core::{render_json, render_text, sort_scores, RiskEngine, ThresholdBand, TimeWindow};
use std::fs;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn reference() -> DateTime<Utc> {
    "2024-03-10T12:00:00Z".parse().unwrap()
}

#[test]
fn test_load_fixture_normalizes_records() {
    let signals = load_signals(&fixture_path("northeast_signals.json"), false).unwrap();
    assert_eq!(signals.len(), 7);

    let market = &signals[0];
    assert_eq!(market.location.as_deref(), Some("Khwairamband Bazaar"));
    assert_eq!(
        market.geo_sensitivity.iter().next(),
        Some(&netra_core::GeoSensitivity::Market),
        "long classifier tag names map onto the short ones"
    );

    // Missing source type falls back to the default label
    assert_eq!(signals[1].source_type, "public_open_source");
}

#[test]
fn test_strict_load_rejects_invalid_records() {
    let err = load_signals(&fixture_path("mixed_validity_signals.json"), false).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("mixed_validity_signals.json"));
    assert!(message.contains("no risk layers"));
}

#[test]
fn test_lenient_load_skips_invalid_records() {
    let signals = load_signals(&fixture_path("mixed_validity_signals.json"), true).unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].district, "Dimapur");
    assert_eq!(signals[0].severity_score, 5, "severity is clamped into 1..=5");
}

#[test]
fn test_batch_over_fixture() {
    let signals = load_signals(&fixture_path("northeast_signals.json"), false).unwrap();
    let grouped = group_by_district(signals);
    assert_eq!(
        grouped.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Aizawl", "Imphal West", "Kohima", "Tawang"]
    );

    let engine = RiskEngine::default();
    let results = engine.batch_compute_districts(&grouped, TimeWindow::default(), reference());
    assert_eq!(results.len(), 4);

    let imphal = &results["Imphal West"];
    assert_eq!(imphal.state, "Manipur");
    assert_eq!(imphal.composite_score, 93.6);
    assert_eq!(imphal.top_signals[0].location, "Imphal West");
    assert_eq!(imphal.top_signals[1].location, "Khwairamband Bazaar");

    // Only a 48h-old signal: known quiet, not absent
    let tawang = &results["Tawang"];
    assert_eq!(tawang.signal_count, 0);
    assert_eq!(tawang.threshold_info.label, ThresholdBand::Baseline);

    // Stabilizing-only window still yields a record, with no trigger
    let aizawl = &results["Aizawl"];
    assert_eq!(aizawl.signal_count, 1);
    assert_eq!(aizawl.primary_trigger, None);

    let sorted = sort_scores(results.into_values().collect());
    let order: Vec<_> = sorted.iter().map(|s| s.district.as_str()).collect();
    assert_eq!(order, vec!["Imphal West", "Kohima", "Aizawl", "Tawang"]);

    let table = render_text(&sorted);
    assert_eq!(table.lines().count(), 5);

    let json = render_json(&sorted);
    assert!(!json.contains("source_url"), "classifier extras never reach the output");
    assert!(!json.contains("rationale"));
}

#[test]
fn test_config_file_changes_scores() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(
        fixture_path("netra.config.json"),
        dir.path().join("netra.config.json"),
    )
    .unwrap();

    let resolved = load_and_resolve(dir.path(), None).unwrap();
    assert!(resolved.config_path.is_some());
    let window = resolved.engine.window;
    assert_eq!(window.as_hours(), 48);

    let engine = RiskEngine::new(resolved.engine);
    let grouped = group_by_district(
        load_signals(&fixture_path("northeast_signals.json"), false).unwrap(),
    );
    let results = engine.batch_compute_districts(&grouped, window, reference());

    let imphal = &results["Imphal West"];
    assert_eq!(imphal.top_signals.len(), 2);
    assert_eq!(imphal.time_window, "48h");
    // Physical weighted up, cognitive down for this district
    assert_eq!(imphal.linear_score, 82.6);
    assert_eq!(imphal.composite_score, 96.3);

    // Tawang's 50h-old signal is inside a 48h window only if it is newer than
    // 48h; it is not, so the district stays quiet.
    assert_eq!(results["Tawang"].signal_count, 0);
    assert_eq!(results["Kohima"].signal_count, 2);
}
