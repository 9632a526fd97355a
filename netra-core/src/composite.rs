//! Composite risk score (0-100) and threshold bands
//!
//! Formula:
//! linear    = sum(w_layer * score_layer) / (sum(w) * 10) * 100
//! composite = 100 / (1 + exp(-steepness * (linear - midpoint)))
//!
//! Global invariants enforced:
//! - Deterministic, monotonic in every layer score (for non-negative weights)
//! - Output always in [0, 100], never NaN
//! - Bands are a fixed, non-overlapping partition of [0, 100]

use crate::layers::{LayerScores, MAX_LAYER_SCORE};
use crate::signal::RiskLayer;
use serde::{Deserialize, Serialize};

/// Floor applied by false-positive feedback decay
pub const FEEDBACK_WEIGHT_FLOOR: f64 = 0.1;

/// Multiplier applied by false-positive feedback decay
pub const FEEDBACK_DECAY: f64 = 0.95;

/// Per-layer weights for the composite sum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub cognitive: f64,
    pub network: f64,
    pub physical: f64,
}

impl Default for LayerWeights {
    fn default() -> Self {
        LayerWeights {
            cognitive: 1.0,
            network: 1.0,
            physical: 1.0,
        }
    }
}

impl LayerWeights {
    pub fn get(&self, layer: RiskLayer) -> f64 {
        match layer {
            RiskLayer::Cognitive => self.cognitive,
            RiskLayer::Network => self.network,
            RiskLayer::Physical => self.physical,
        }
    }

    pub fn total(&self) -> f64 {
        self.cognitive + self.network + self.physical
    }

    /// Weights after an officer flags a score as a false positive
    ///
    /// Cognitive and network weights decay by 5% (floored at 0.1); the physical
    /// weight is left alone. The engine never calls this itself.
    pub fn after_false_positive(&self) -> LayerWeights {
        LayerWeights {
            cognitive: (self.cognitive * FEEDBACK_DECAY).max(FEEDBACK_WEIGHT_FLOOR),
            network: (self.network * FEEDBACK_DECAY).max(FEEDBACK_WEIGHT_FLOOR),
            physical: self.physical,
        }
    }
}

/// Logistic transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidParams {
    pub midpoint: f64,
    pub steepness: f64,
}

impl Default for SigmoidParams {
    fn default() -> Self {
        SigmoidParams {
            midpoint: 50.0,
            steepness: 0.1,
        }
    }
}

/// Threshold band of a composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdBand {
    Baseline,            // [0, 30)
    Monitoring,          // [30, 60)
    PreventiveReadiness, // [60, 75)
    SeniorReview,        // [75, 90)
    Critical,            // [90, 100]
}

impl ThresholdBand {
    /// Lower bound (inclusive) of the band
    pub fn lower_bound(&self) -> f64 {
        match self {
            ThresholdBand::Baseline => 0.0,
            ThresholdBand::Monitoring => 30.0,
            ThresholdBand::PreventiveReadiness => 60.0,
            ThresholdBand::SeniorReview => 75.0,
            ThresholdBand::Critical => 90.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdBand::Baseline => "BASELINE",
            ThresholdBand::Monitoring => "MONITORING",
            ThresholdBand::PreventiveReadiness => "PREVENTIVE_READINESS",
            ThresholdBand::SeniorReview => "SENIOR_REVIEW",
            ThresholdBand::Critical => "CRITICAL",
        }
    }

    /// Display range of the band
    pub fn range(&self) -> &'static str {
        match self {
            ThresholdBand::Baseline => "0-29",
            ThresholdBand::Monitoring => "30-59",
            ThresholdBand::PreventiveReadiness => "60-74",
            ThresholdBand::SeniorReview => "75-89",
            ThresholdBand::Critical => "90-100",
        }
    }
}

impl std::fmt::Display for ThresholdBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-level summary used by dashboards and alert channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,      // < 30
    Medium,   // 30-60
    High,     // 60-75
    Critical, // >= 75
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Weighted layer sum normalized to a 0-100 percentage of the theoretical max
///
/// Returns 0.0 when the weights sum to zero.
pub fn linear_score(layer_scores: &LayerScores, weights: &LayerWeights) -> f64 {
    let max_possible = weights.total() * MAX_LAYER_SCORE;
    if max_possible.is_nan() || max_possible <= 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = layer_scores
        .iter()
        .map(|(layer, score)| weights.get(layer) * score)
        .sum();
    let normalized = weighted_sum / max_possible * 100.0;
    if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 100.0)
    }
}

/// Logistic transform of a 0-100 percentage, clamped to [0, 100]
pub fn sigmoid(normalized: f64, params: &SigmoidParams) -> f64 {
    let exponent = -params.steepness * (normalized - params.midpoint);
    // exp overflows to +inf for huge exponents, which correctly yields 0
    let score = 100.0 / (1.0 + exponent.exp());
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Composite score from layer scores
pub fn composite_score(
    layer_scores: &LayerScores,
    weights: &LayerWeights,
    params: &SigmoidParams,
) -> f64 {
    sigmoid(linear_score(layer_scores, weights), params)
}

/// Classify a composite score into its threshold band
///
/// Lower bounds are inclusive, upper bounds exclusive, except CRITICAL which
/// includes 100.
pub fn classify(score: f64) -> ThresholdBand {
    if score >= ThresholdBand::Critical.lower_bound() {
        ThresholdBand::Critical
    } else if score >= ThresholdBand::SeniorReview.lower_bound() {
        ThresholdBand::SeniorReview
    } else if score >= ThresholdBand::PreventiveReadiness.lower_bound() {
        ThresholdBand::PreventiveReadiness
    } else if score >= ThresholdBand::Monitoring.lower_bound() {
        ThresholdBand::Monitoring
    } else {
        ThresholdBand::Baseline
    }
}

/// Coarse four-level risk classification
pub fn risk_level(score: f64) -> RiskLevel {
    if score >= 75.0 {
        RiskLevel::Critical
    } else if score >= 60.0 {
        RiskLevel::High
    } else if score >= 30.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
