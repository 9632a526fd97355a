//! Per-signal importance weight
//!
//! weight = severity_weight * recency_weight * geo_multiplier * polarity_factor
//!
//! Global invariants enforced:
//! - Deterministic, pure computation (reference time is always explicit)
//! - Recency weight never drops below the configured floor
//! - Elapsed time is clamped at zero (clock skew never inverts decay)
//! - Weights may be negative; clamping happens at layer aggregation

use crate::signal::{GeoSensitivity, Polarity, Signal, MAX_SEVERITY};
use chrono::{DateTime, Utc};

/// Default exponential decay rate (per day)
pub const DEFAULT_DECAY_RATE: f64 = 0.5;

/// Default floor for the recency weight
pub const DEFAULT_MIN_RECENCY_WEIGHT: f64 = 0.1;

/// Tunable parameters of the weighting function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightingParams {
    pub decay_rate: f64,
    pub min_recency_weight: f64,
}

impl Default for WeightingParams {
    fn default() -> Self {
        WeightingParams {
            decay_rate: DEFAULT_DECAY_RATE,
            min_recency_weight: DEFAULT_MIN_RECENCY_WEIGHT,
        }
    }
}

/// Breakdown of one signal's weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightFactors {
    pub severity: f64,
    pub recency: f64,
    pub geo: f64,
    pub polarity: f64,
}

impl WeightFactors {
    pub fn weight(&self) -> f64 {
        self.severity * self.recency * self.geo * self.polarity
    }
}

/// Severity weight: severity / 5, in (0.2, 1.0]
pub fn severity_weight(severity: u8) -> f64 {
    severity as f64 / MAX_SEVERITY as f64
}

/// Hours between the signal and the reference time, never negative
pub fn hours_elapsed(signal_time: DateTime<Utc>, reference_time: DateTime<Utc>) -> f64 {
    let millis = (reference_time - signal_time).num_milliseconds();
    (millis as f64 / 3_600_000.0).max(0.0)
}

/// Recency weight: exp(-decay_rate * hours / 24), floored
pub fn recency_weight(hours: f64, params: &WeightingParams) -> f64 {
    let hours = hours.max(0.0);
    let weight = (-params.decay_rate * hours / 24.0).exp();
    if weight.is_finite() {
        weight.max(params.min_recency_weight)
    } else {
        params.min_recency_weight
    }
}

/// Multiplier for a single geo-sensitivity tag
pub fn geo_tag_multiplier(tag: GeoSensitivity) -> f64 {
    match tag {
        GeoSensitivity::Border => 1.5,
        GeoSensitivity::Market => 1.2,
        GeoSensitivity::Highway => 1.3,
        GeoSensitivity::Capital => 1.4,
        GeoSensitivity::SensitiveZone => 1.6,
    }
}

/// Maximum multiplier over all tags; 1.0 for an ordinary location
pub fn geo_multiplier<'a>(tags: impl IntoIterator<Item = &'a GeoSensitivity>) -> f64 {
    tags.into_iter()
        .map(|tag| geo_tag_multiplier(*tag))
        .fold(1.0, f64::max)
}

/// Sign and magnitude of a signal's contribution
pub fn polarity_factor(polarity: Polarity) -> f64 {
    match polarity {
        Polarity::Escalatory => 1.0,
        Polarity::Neutral => 0.3,
        Polarity::Stabilizing => -0.5,
    }
}

/// All weight factors for one signal
pub fn weight_factors(
    signal: &Signal,
    reference_time: DateTime<Utc>,
    params: &WeightingParams,
) -> WeightFactors {
    WeightFactors {
        severity: severity_weight(signal.severity()),
        recency: recency_weight(hours_elapsed(signal.timestamp, reference_time), params),
        geo: geo_multiplier(&signal.geo_sensitivity),
        polarity: polarity_factor(signal.polarity),
    }
}

/// Composite weight for one signal
pub fn signal_weight(
    signal: &Signal,
    reference_time: DateTime<Utc>,
    params: &WeightingParams,
) -> f64 {
    weight_factors(signal, reference_time, params).weight()
}
