//! Top contributing signals for human review
//!
//! Summaries expose only fields already public on the signal: event summary,
//! severity, timestamp, source type, layer tags and a location label. Nothing
//! else ever reaches the explainability surface.

use crate::signal::{RiskLayer, Signal};
use crate::weighting::{signal_weight, WeightingParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of signals surfaced per district
pub const DEFAULT_TOP_SIGNALS: usize = 3;

/// Sanitized view of one contributing signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub event_summary: String,
    pub severity: u8,
    pub timestamp: DateTime<Utc>,
    pub source_type: String,
    pub layers: Vec<RiskLayer>,
    /// Specific location when known, otherwise the district name
    pub location: String,
}

impl SignalSummary {
    pub fn from_signal(signal: &Signal) -> Self {
        SignalSummary {
            event_summary: signal.event_summary.clone(),
            severity: signal.severity(),
            timestamp: signal.timestamp,
            source_type: signal.source_type.clone(),
            layers: signal.risk_layers.iter().copied().collect(),
            location: signal
                .location
                .clone()
                .unwrap_or_else(|| signal.district.clone()),
        }
    }
}

/// Select the `count` highest-weight signals, most contributing first
///
/// Ordering: weight descending, then newest first, then event summary
/// ascending. Stabilizing signals carry negative weight and sort last.
/// Returns an empty list, never an error, when there is nothing to show.
pub fn select_top_signals<'a>(
    signals: impl IntoIterator<Item = &'a Signal>,
    reference_time: DateTime<Utc>,
    params: &WeightingParams,
    count: usize,
) -> Vec<SignalSummary> {
    if count == 0 {
        return Vec::new();
    }

    let mut weighted: Vec<(&Signal, f64)> = signals
        .into_iter()
        .map(|signal| (signal, signal_weight(signal, reference_time, params)))
        .collect();

    weighted.sort_by(|(a, wa), (b, wb)| {
        wb.partial_cmp(wa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.event_summary.cmp(&b.event_summary))
    });

    weighted
        .into_iter()
        .take(count)
        .map(|(signal, _)| SignalSummary::from_signal(signal))
        .collect()
}
