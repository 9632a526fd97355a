//! District risk records and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs
//! - Layer scores rounded to 2 decimals, composite and linear scores to 1

use crate::composite::{RiskLevel, ThresholdBand};
use crate::explain::SignalSummary;
use crate::layers::LayerScores;
use crate::signal::RiskLayer;
use crate::trends::Trend;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attached to every record handed to downstream consumers
pub const GOVERNANCE_DISCLAIMER: &str =
    "Derived from public open-source indicators. Decision support only.";

/// Threshold band details for a composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdInfo {
    pub label: ThresholdBand,
    pub range: String,
    /// True once the score has left the baseline band
    pub crossed: bool,
}

impl ThresholdInfo {
    pub fn for_band(band: ThresholdBand) -> Self {
        ThresholdInfo {
            label: band,
            range: band.range().to_string(),
            crossed: band != ThresholdBand::Baseline,
        }
    }
}

/// Complete, explainable risk assessment for one district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRiskScore {
    pub district: String,
    pub state: String,
    pub composite_score: f64,
    /// Weighted layer percentage before the sigmoid transform
    pub linear_score: f64,
    pub risk_level: RiskLevel,
    pub layer_scores: LayerScores,
    /// None when no layer carries any risk
    pub primary_trigger: Option<RiskLayer>,
    pub secondary_triggers: Vec<RiskLayer>,
    pub trend: Trend,
    pub top_signals: Vec<SignalSummary>,
    pub threshold_info: ThresholdInfo,
    pub time_window: String,
    pub signal_count: usize,
    /// Reference time of the computation
    pub timestamp: DateTime<Utc>,
    pub governance_disclaimer: String,
}

impl DistrictRiskScore {
    /// Serialize to a pretty JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize district risk score")
    }
}

/// Format a window length as stored in records, e.g. "24h"
pub fn format_window(hours: i64) -> String {
    format!("{}h", hours)
}

/// Sort records deterministically
pub fn sort_scores(mut scores: Vec<DistrictRiskScore>) -> Vec<DistrictRiskScore> {
    scores.sort_by(|a, b| {
        // 1. Composite score descending
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            // 2. State ascending
            .then_with(|| a.state.cmp(&b.state))
            // 3. District ascending
            .then_with(|| a.district.cmp(&b.district))
    });
    scores
}

/// Render a table of district scores
pub fn render_text(scores: &[DistrictRiskScore]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<7} {:<22} {:<24} {:<18} {:<9} {:<10} {}\n",
        "SCORE", "BAND", "DISTRICT", "STATE", "TREND", "TRIGGER", "SIGNALS"
    ));

    for score in scores {
        let trigger = score
            .primary_trigger
            .map(|layer| layer.as_str())
            .unwrap_or("-");
        output.push_str(&format!(
            "{:<7} {:<22} {:<24} {:<18} {:<9} {:<10} {}\n",
            format!("{:.1}", score.composite_score),
            score.threshold_info.label.as_str(),
            truncate_or_pad(&score.district, 24),
            truncate_or_pad(&score.state, 18),
            score.trend.as_str(),
            trigger,
            score.signal_count,
        ));
    }

    output
}

/// Render a detailed explanation of one district score
pub fn render_explain(score: &DistrictRiskScore) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}, {}\n", score.district, score.state));
    output.push_str(&format!("{}\n", "=".repeat(80)));
    output.push_str(&format!(
        "Composite Score: {:.1}/100 [{}] ({})\n",
        score.composite_score,
        score.threshold_info.label.as_str(),
        score.threshold_info.range
    ));
    output.push_str(&format!(
        "Linear Score:    {:.1}/100 (before sigmoid)\n",
        score.linear_score
    ));
    output.push_str(&format!("Risk Level:      {}\n", score.risk_level.as_str()));
    output.push_str(&format!("Trend:           {}\n", score.trend.as_str()));
    output.push_str(&format!(
        "Window:          {} ({} signals, reference {})\n",
        score.time_window,
        score.signal_count,
        score.timestamp.to_rfc3339()
    ));

    output.push_str("Layer Scores:\n");
    for (layer, value) in score.layer_scores.iter() {
        output.push_str(&format!("  • {:<10} {:>5.2}/10\n", layer.as_str(), value));
    }

    match score.primary_trigger {
        Some(primary) => {
            output.push_str(&format!("Primary Trigger: {}\n", primary));
            if !score.secondary_triggers.is_empty() {
                let secondary = score
                    .secondary_triggers
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                output.push_str(&format!("Secondary:       {}\n", secondary));
            }
        }
        None => output.push_str("Primary Trigger: none (no layer carries risk)\n"),
    }

    if score.top_signals.is_empty() {
        output.push_str("Top Signals:     none\n");
    } else {
        output.push_str("Top Signals:\n");
        for (i, signal) in score.top_signals.iter().enumerate() {
            let layers = signal
                .layers
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join("+");
            output.push_str(&format!(
                "  {}. {} (severity {}, {}, {}, {})\n",
                i + 1,
                signal.event_summary,
                signal.severity,
                layers,
                signal.location,
                signal.timestamp.to_rfc3339()
            ));
        }
    }

    output.push_str(&format!("\n{}\n", score.governance_disclaimer));
    output
}

/// Render records as JSON output
pub fn render_json(scores: &[DistrictRiskScore]) -> String {
    serde_json::to_string_pretty(scores).unwrap_or_else(|_| "[]".to_string())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(district: &str, state: &str, composite: f64) -> DistrictRiskScore {
        let band = crate::composite::classify(composite);
        DistrictRiskScore {
            district: district.to_string(),
            state: state.to_string(),
            composite_score: composite,
            linear_score: composite,
            risk_level: crate::composite::risk_level(composite),
            layer_scores: LayerScores::default(),
            primary_trigger: None,
            secondary_triggers: Vec::new(),
            trend: Trend::Stable,
            top_signals: Vec::new(),
            threshold_info: ThresholdInfo::for_band(band),
            time_window: format_window(24),
            signal_count: 0,
            timestamp: "2024-03-10T12:00:00Z".parse().unwrap(),
            governance_disclaimer: GOVERNANCE_DISCLAIMER.to_string(),
        }
    }

    #[test]
    fn test_sort_scores_deterministic() {
        let sorted = sort_scores(vec![
            record("Tawang", "Arunachal Pradesh", 40.0),
            record("Aizawl", "Mizoram", 80.0),
            record("Kohima", "Nagaland", 40.0),
            record("Changlang", "Arunachal Pradesh", 40.0),
        ]);
        let names: Vec<_> = sorted.iter().map(|s| s.district.as_str()).collect();
        assert_eq!(names, vec!["Aizawl", "Changlang", "Tawang", "Kohima"]);
    }

    #[test]
    fn test_threshold_info_crossed() {
        assert!(!ThresholdInfo::for_band(ThresholdBand::Baseline).crossed);
        let info = ThresholdInfo::for_band(ThresholdBand::Monitoring);
        assert!(info.crossed);
        assert_eq!(info.range, "30-59");
    }

    #[test]
    fn test_json_field_names() {
        let json = record("Aizawl", "Mizoram", 12.3).to_json().unwrap();
        assert!(json.contains("\"composite_score\": 12.3"));
        assert!(json.contains("\"label\": \"BASELINE\""));
        assert!(json.contains("\"primary_trigger\": null"));
        assert!(json.contains("\"time_window\": \"24h\""));
        assert!(json.contains("\"timestamp\": \"2024-03-10T12:00:00Z\""));
    }

    #[test]
    fn test_render_text_has_row_per_district() {
        let text = render_text(&[record("Aizawl", "Mizoram", 80.0), record("Kohima", "Nagaland", 5.0)]);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("SENIOR_REVIEW"));
        assert!(text.contains("80.0"));
    }

    #[test]
    fn test_render_explain_without_trigger() {
        let text = render_explain(&record("Kohima", "Nagaland", 0.0));
        assert!(text.contains("Primary Trigger: none"));
        assert!(text.contains("Top Signals:     none"));
        assert!(text.contains(GOVERNANCE_DISCLAIMER));
    }

    #[test]
    fn test_truncate_or_pad() {
        assert_eq!(truncate_or_pad("abc", 5), "abc  ");
        assert_eq!(truncate_or_pad("South Salmara-Mankachar", 10), "South S...");
    }
}
