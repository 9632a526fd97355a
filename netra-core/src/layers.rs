//! Layer aggregation: many signal weights into three 0-10 layer scores
//!
//! Each layer score is the mean weight of the signals tagged with that layer,
//! scaled by 10 and clamped to [0, 10]. A signal contributes to every layer it
//! is tagged with, independently.
//!
//! A single extreme signal in a thinly populated layer dominates that layer.
//! This is the intended behavior; no prior or minimum-sample smoothing is applied.

use crate::signal::{RiskLayer, Signal};
use crate::weighting::{signal_weight, WeightingParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of a layer score
pub const MAX_LAYER_SCORE: f64 = 10.0;

/// Scores for the three risk layers, each in [0, 10]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerScores {
    pub cognitive: f64,
    pub network: f64,
    pub physical: f64,
}

impl LayerScores {
    pub fn get(&self, layer: RiskLayer) -> f64 {
        match layer {
            RiskLayer::Cognitive => self.cognitive,
            RiskLayer::Network => self.network,
            RiskLayer::Physical => self.physical,
        }
    }

    fn set(&mut self, layer: RiskLayer, score: f64) {
        match layer {
            RiskLayer::Cognitive => self.cognitive = score,
            RiskLayer::Network => self.network = score,
            RiskLayer::Physical => self.physical = score,
        }
    }

    /// (layer, score) pairs in priority order
    pub fn iter(&self) -> impl Iterator<Item = (RiskLayer, f64)> + '_ {
        RiskLayer::ALL.iter().map(move |layer| (*layer, self.get(*layer)))
    }

    pub fn is_all_zero(&self) -> bool {
        self.iter().all(|(_, score)| score == 0.0)
    }

    /// Copy with each score rounded to 2 decimal places
    pub fn rounded(&self) -> LayerScores {
        LayerScores {
            cognitive: crate::round_to(self.cognitive, 2),
            network: crate::round_to(self.network, 2),
            physical: crate::round_to(self.physical, 2),
        }
    }
}

/// Running sum and count for one layer
#[derive(Debug, Clone, Copy, Default)]
struct LayerAccumulator {
    sum: f64,
    count: usize,
}

impl LayerAccumulator {
    fn score(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let raw = self.sum / self.count as f64 * MAX_LAYER_SCORE;
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, MAX_LAYER_SCORE)
        }
    }
}

/// Aggregate signals into the three layer scores
///
/// Signals with an empty layer set contribute to no layer.
pub fn aggregate_layers<'a>(
    signals: impl IntoIterator<Item = &'a Signal>,
    reference_time: DateTime<Utc>,
    params: &WeightingParams,
) -> LayerScores {
    let mut accumulators = [LayerAccumulator::default(); 3];

    for signal in signals {
        if signal.risk_layers.is_empty() {
            continue;
        }
        let weight = signal_weight(signal, reference_time, params);
        for layer in &signal.risk_layers {
            let acc = &mut accumulators[layer_index(*layer)];
            acc.sum += weight;
            acc.count += 1;
        }
    }

    let mut scores = LayerScores::default();
    for layer in RiskLayer::ALL {
        scores.set(layer, accumulators[layer_index(layer)].score());
    }
    scores
}

fn layer_index(layer: RiskLayer) -> usize {
    match layer {
        RiskLayer::Cognitive => 0,
        RiskLayer::Network => 1,
        RiskLayer::Physical => 2,
    }
}
