//! NE-NETRA core library - district risk aggregation and composite scoring

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Scoring is strictly per-district
// - No global mutable state; weight tables live in an immutable EngineConfig
// - No clock reads inside scoring; the reference time is always passed in
// - Deterministic ordering must be explicit (BTreeMap/BTreeSet, total sorts)
// - Identical input yields byte-for-byte identical output
// - Outputs never contain fields beyond those public on the input signals

pub mod composite;
pub mod config;
pub mod engine;
pub mod explain;
pub mod layers;
pub mod report;
pub mod signal;
pub mod trends;
pub mod weighting;

pub use composite::{LayerWeights, RiskLevel, SigmoidParams, ThresholdBand};
pub use config::ResolvedConfig;
pub use engine::{EngineConfig, RiskEngine, TimeWindow};
pub use layers::LayerScores;
pub use report::{render_json, render_text, sort_scores, DistrictRiskScore};
pub use signal::{GeoSensitivity, Polarity, RiskLayer, Signal};
pub use trends::Trend;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Compute one district's risk with the default configuration
pub fn compute_district_risk(
    district: &str,
    state: &str,
    signals: &[Signal],
    window: TimeWindow,
    reference_time: DateTime<Utc>,
) -> DistrictRiskScore {
    RiskEngine::default().compute_district_risk(district, state, signals, window, reference_time)
}

/// Compute every district with the default configuration
pub fn batch_compute_districts(
    district_signals: &BTreeMap<String, Vec<Signal>>,
    window: TimeWindow,
    reference_time: DateTime<Utc>,
) -> BTreeMap<String, DistrictRiskScore> {
    RiskEngine::default().batch_compute_districts(district_signals, window, reference_time)
}

/// Round half away from zero to `places` decimals
///
/// Non-finite input rounds to 0.0 so records never carry NaN.
pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
