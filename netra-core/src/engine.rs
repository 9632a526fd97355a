//! Risk aggregation engine
//!
//! Composes weighting, layer aggregation, composite scoring, trend and trigger
//! analysis and top-signal selection into one district computation.
//!
//! Global invariants enforced:
//! - Pure with respect to inputs: no clock reads, no I/O, no shared mutable state
//! - Identical (signals, window, reference time, config) yields identical output
//! - Empty windows return an explicit baseline record, never an error
//! - Input signals are borrowed for the duration of the call only

use crate::composite::{
    classify, composite_score, linear_score, risk_level, LayerWeights, SigmoidParams,
};
use crate::explain::{select_top_signals, DEFAULT_TOP_SIGNALS};
use crate::layers::{aggregate_layers, LayerScores};
use crate::report::{format_window, DistrictRiskScore, ThresholdInfo, GOVERNANCE_DISCLAIMER};
use crate::round_to;
use crate::signal::Signal;
use crate::trends::{detect_trend, identify_triggers, Trend};
use crate::weighting::WeightingParams;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Default scoring window in hours
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Length of the scoring window
///
/// Construction rejects negative lengths; a constructed window is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    hours: i64,
}

impl TimeWindow {
    /// Upper bound keeping the cutoff arithmetic far from chrono's range limits (100 years)
    pub const MAX_HOURS: i64 = 24 * 365 * 100;

    pub fn hours(hours: i64) -> Result<Self> {
        if hours < 0 {
            anyhow::bail!("window_hours must be non-negative (got {})", hours);
        }
        if hours > Self::MAX_HOURS {
            anyhow::bail!(
                "window_hours must be at most {} (got {})",
                Self::MAX_HOURS,
                hours
            );
        }
        Ok(TimeWindow { hours })
    }

    pub fn as_hours(&self) -> i64 {
        self.hours
    }

    /// Earliest timestamp (inclusive) inside the window
    pub fn start(&self, reference_time: DateTime<Utc>) -> DateTime<Utc> {
        reference_time - Duration::hours(self.hours)
    }

    /// Whether a timestamp falls in `[reference - hours, reference]`
    pub fn contains(&self, timestamp: DateTime<Utc>, reference_time: DateTime<Utc>) -> bool {
        timestamp >= self.start(reference_time) && timestamp <= reference_time
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow {
            hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

/// Immutable engine configuration
///
/// Built once (defaults or a resolved config file) and shared read-only by
/// every computation, so districts with different weight tables can run
/// concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub weighting: WeightingParams,
    pub sigmoid: SigmoidParams,
    /// Layer weights for districts without an override
    pub default_weights: LayerWeights,
    /// Per-district layer weight overrides
    pub district_weights: HashMap<String, LayerWeights>,
    pub window: TimeWindow,
    pub top_signals: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            weighting: WeightingParams::default(),
            sigmoid: SigmoidParams::default(),
            default_weights: LayerWeights::default(),
            district_weights: HashMap::new(),
            window: TimeWindow::default(),
            top_signals: DEFAULT_TOP_SIGNALS,
        }
    }
}

impl EngineConfig {
    /// Layer weights in effect for a district
    pub fn weights_for(&self, district: &str) -> LayerWeights {
        self.district_weights
            .get(district)
            .copied()
            .unwrap_or(self.default_weights)
    }
}

/// Stateless district risk engine
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: EngineConfig,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> Self {
        RiskEngine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Signals inside the scoring window, in input order
    pub fn filter_by_window<'a>(
        &self,
        signals: &'a [Signal],
        window: TimeWindow,
        reference_time: DateTime<Utc>,
    ) -> Vec<&'a Signal> {
        signals
            .iter()
            .filter(|signal| window.contains(signal.timestamp, reference_time))
            .collect()
    }

    /// Compute the risk record for one district
    ///
    /// `signals` is the district's full history; only the windowed subset is
    /// scored, while trend detection looks back over everything passed in.
    pub fn compute_district_risk(
        &self,
        district: &str,
        state: &str,
        signals: &[Signal],
        window: TimeWindow,
        reference_time: DateTime<Utc>,
    ) -> DistrictRiskScore {
        let windowed = self.filter_by_window(signals, window, reference_time);

        if windowed.is_empty() {
            tracing::debug!(district, state, "no signals in window, baseline result");
            return baseline_score(district, state, window, reference_time);
        }

        let params = &self.config.weighting;
        let weights = self.config.weights_for(district);

        let layer_scores = aggregate_layers(windowed.iter().copied(), reference_time, params);
        let linear = linear_score(&layer_scores, &weights);
        let composite = round_to(
            composite_score(&layer_scores, &weights, &self.config.sigmoid),
            1,
        );
        let band = classify(composite);
        let triggers = identify_triggers(&layer_scores);
        let trend = detect_trend(signals, reference_time);
        let top_signals = select_top_signals(
            windowed.iter().copied(),
            reference_time,
            params,
            self.config.top_signals,
        );

        let (primary_trigger, secondary_triggers) = if triggers.significant {
            (Some(triggers.primary), triggers.secondary)
        } else {
            (None, Vec::new())
        };

        tracing::debug!(
            district,
            state,
            signals = windowed.len(),
            composite,
            band = band.as_str(),
            trend = trend.as_str(),
            "computed district risk"
        );

        DistrictRiskScore {
            district: district.to_string(),
            state: state.to_string(),
            composite_score: composite,
            linear_score: round_to(linear, 1),
            risk_level: risk_level(composite),
            layer_scores: layer_scores.rounded(),
            primary_trigger,
            secondary_triggers,
            trend,
            top_signals,
            threshold_info: ThresholdInfo::for_band(band),
            time_window: format_window(window.as_hours()),
            signal_count: windowed.len(),
            timestamp: reference_time,
            governance_disclaimer: GOVERNANCE_DISCLAIMER.to_string(),
        }
    }

    /// Compute with the configured default window
    pub fn compute_with_default_window(
        &self,
        district: &str,
        state: &str,
        signals: &[Signal],
        reference_time: DateTime<Utc>,
    ) -> DistrictRiskScore {
        self.compute_district_risk(district, state, signals, self.config.window, reference_time)
    }

    /// Compute every district independently, in parallel
    ///
    /// Districts whose signal list is empty are omitted from the result, while
    /// a district with signals that all fall outside the window still gets an
    /// explicit baseline record. Absent means "never queried"; a baseline
    /// record means "known quiet". Each district's state is taken from its
    /// first signal.
    pub fn batch_compute_districts(
        &self,
        district_signals: &BTreeMap<String, Vec<Signal>>,
        window: TimeWindow,
        reference_time: DateTime<Utc>,
    ) -> BTreeMap<String, DistrictRiskScore> {
        let results: BTreeMap<String, DistrictRiskScore> = district_signals
            .par_iter()
            .filter_map(|(district, signals)| {
                let state = signals.first()?.state.as_str();
                let score =
                    self.compute_district_risk(district, state, signals, window, reference_time);
                Some((district.clone(), score))
            })
            .collect();

        tracing::info!(
            requested = district_signals.len(),
            computed = results.len(),
            window = %format_window(window.as_hours()),
            "batch computation finished"
        );
        results
    }
}

/// Zeroed, deterministic record for a district with nothing in its window
pub fn baseline_score(
    district: &str,
    state: &str,
    window: TimeWindow,
    reference_time: DateTime<Utc>,
) -> DistrictRiskScore {
    let band = classify(0.0);
    DistrictRiskScore {
        district: district.to_string(),
        state: state.to_string(),
        composite_score: 0.0,
        linear_score: 0.0,
        risk_level: risk_level(0.0),
        layer_scores: LayerScores::default(),
        primary_trigger: None,
        secondary_triggers: Vec::new(),
        trend: Trend::Stable,
        top_signals: Vec::new(),
        threshold_info: ThresholdInfo::for_band(band),
        time_window: format_window(window.as_hours()),
        signal_count: 0,
        timestamp: reference_time,
        governance_disclaimer: GOVERNANCE_DISCLAIMER.to_string(),
    }
}
