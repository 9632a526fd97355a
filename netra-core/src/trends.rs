//! Trend direction and trigger attribution
//!
//! Trend compares mean raw severity of the last 24h against the 24-72h bucket
//! before it. It deliberately ignores layers and weights so that it is
//! decoupled from the non-linear composite transform.
//!
//! Global invariants enforced:
//! - Deterministic ordering (layer priority: cognitive, network, physical)
//! - Trend uses the full signal history, not the scoring window
//! - No history means no detectable drift

use crate::layers::LayerScores;
use crate::signal::{RiskLayer, Signal};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Width of the "recent" bucket in hours
pub const RECENT_BUCKET_HOURS: i64 = 24;

/// Total trend lookback in hours ("older" bucket is 24-72h)
pub const TREND_LOOKBACK_HOURS: i64 = 72;

/// Mean severity delta beyond which a trend is rising or falling
pub const TREND_DELTA_THRESHOLD: f64 = 0.5;

/// Secondary triggers must reach this fraction of the primary score
pub const SECONDARY_TRIGGER_RATIO: f64 = 0.5;

/// Direction of severity drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Stable,
    Falling,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Stable => "stable",
            Trend::Falling => "falling",
        }
    }
}

/// Mean severity of the two trend buckets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityBuckets {
    pub recent_mean: Option<f64>,
    pub older_mean: Option<f64>,
    pub recent_count: usize,
    pub older_count: usize,
}

/// Partition history into recent `[ref - 24h, ref]` and older `[ref - 72h, ref - 24h)`
///
/// Signals stamped after the reference time belong to neither bucket.
pub fn severity_buckets(signals: &[Signal], reference_time: DateTime<Utc>) -> SeverityBuckets {
    let recent_cutoff = reference_time - Duration::hours(RECENT_BUCKET_HOURS);
    let older_cutoff = reference_time - Duration::hours(TREND_LOOKBACK_HOURS);

    let mut recent = (0u64, 0usize);
    let mut older = (0u64, 0usize);

    for signal in signals {
        let ts = signal.timestamp;
        if ts > reference_time {
            continue;
        }
        if ts >= recent_cutoff {
            recent.0 += signal.severity() as u64;
            recent.1 += 1;
        } else if ts >= older_cutoff {
            older.0 += signal.severity() as u64;
            older.1 += 1;
        }
    }

    let mean = |(sum, count): (u64, usize)| {
        if count == 0 {
            None
        } else {
            Some(sum as f64 / count as f64)
        }
    };

    SeverityBuckets {
        recent_mean: mean(recent),
        older_mean: mean(older),
        recent_count: recent.1,
        older_count: older.1,
    }
}

/// Detect the severity trend over the unwindowed history
///
/// - No recent signals: stable
/// - No older signals: the older mean defaults to the recent mean, so the
///   trend is always stable when there is no history to compare against
pub fn detect_trend(signals: &[Signal], reference_time: DateTime<Utc>) -> Trend {
    let buckets = severity_buckets(signals, reference_time);

    let recent = match buckets.recent_mean {
        Some(mean) => mean,
        None => return Trend::Stable,
    };
    let older = buckets.older_mean.unwrap_or(recent);

    let diff = recent - older;
    if diff > TREND_DELTA_THRESHOLD {
        Trend::Rising
    } else if diff < -TREND_DELTA_THRESHOLD {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

/// Primary and secondary trigger layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerAnalysis {
    pub primary: RiskLayer,
    pub secondary: Vec<RiskLayer>,
    /// False when every layer scored zero; `primary` is then only the
    /// priority-order placeholder and must not be reported as a cause.
    pub significant: bool,
}

/// Rank layers to find the primary trigger and any secondary triggers
///
/// Primary is the highest-scoring layer; ties go to the earlier layer in
/// priority order (cognitive, network, physical). Secondary triggers are the
/// other layers scoring at least half of the primary, highest first.
pub fn identify_triggers(layer_scores: &LayerScores) -> TriggerAnalysis {
    let mut primary = RiskLayer::ALL[0];
    let mut primary_score = layer_scores.get(primary);
    for (layer, score) in layer_scores.iter().skip(1) {
        // Strict comparison keeps the earlier layer on ties
        if score > primary_score {
            primary = layer;
            primary_score = score;
        }
    }

    if primary_score <= 0.0 {
        return TriggerAnalysis {
            primary,
            secondary: Vec::new(),
            significant: false,
        };
    }

    let threshold = primary_score * SECONDARY_TRIGGER_RATIO;
    let mut secondary: Vec<(RiskLayer, f64)> = layer_scores
        .iter()
        .filter(|(layer, score)| *layer != primary && *score >= threshold)
        .collect();
    // Score descending, then priority order
    secondary.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    TriggerAnalysis {
        primary,
        secondary: secondary.into_iter().map(|(layer, _)| layer).collect(),
        significant: true,
    }
}
