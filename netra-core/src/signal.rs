//! Classified signal records and the ingestion boundary
//!
//! Signals arrive already classified (layers, polarity, severity, geo tags).
//! They are validated once here and never mutated afterwards.
//!
//! Global invariants enforced:
//! - Severity is clamped to 1..=5 on the way in
//! - Layers and geo tags are ordered sets (no duplicates, fixed iteration order)
//! - District and state are never blank

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 5;

/// Default provenance label for signals that do not state one
pub const DEFAULT_SOURCE_TYPE: &str = "public_open_source";

/// Risk dimension a signal contributes to
///
/// Declaration order is the trigger tie-break priority: cognitive, network, physical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLayer {
    /// Narrative, rumor, threats, protests
    Cognitive,
    /// Coordination and mobilization: bandhs, shutdowns, mass rallies
    Network,
    /// Violence, arms, blockades, border incidents
    Physical,
}

impl RiskLayer {
    /// All layers in priority order
    pub const ALL: [RiskLayer; 3] = [RiskLayer::Cognitive, RiskLayer::Network, RiskLayer::Physical];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLayer::Cognitive => "cognitive",
            RiskLayer::Network => "network",
            RiskLayer::Physical => "physical",
        }
    }
}

impl std::fmt::Display for RiskLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction a signal pushes the district's risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Escalatory,
    Stabilizing,
    Neutral,
}

/// Location sensitivity markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoSensitivity {
    #[serde(alias = "border_area")]
    Border,
    #[serde(alias = "market_trade_hub")]
    Market,
    #[serde(alias = "highway_transit")]
    Highway,
    #[serde(alias = "capital_admin")]
    Capital,
    SensitiveZone,
}

/// One classified, district-tagged incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignalRecord")]
pub struct Signal {
    pub district: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub event_summary: String,
    pub timestamp: DateTime<Utc>,
    pub source_type: String,
    pub risk_layers: BTreeSet<RiskLayer>,
    pub polarity: Polarity,
    pub severity_score: u8,
    pub geo_sensitivity: BTreeSet<GeoSensitivity>,
}

/// Wire shape of a signal before validation
///
/// Unknown fields (source URLs, classifier rationale, compliance markers) are
/// dropped here so they can never reach the explainability output.
#[derive(Debug, Clone, Deserialize)]
struct SignalRecord {
    district: String,
    state: String,
    #[serde(default)]
    location: Option<String>,
    event_summary: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    source_type: Option<String>,
    risk_layers: Vec<RiskLayer>,
    polarity: Polarity,
    severity_score: i64,
    #[serde(default)]
    geo_sensitivity: Vec<GeoSensitivity>,
}

impl TryFrom<SignalRecord> for Signal {
    type Error = anyhow::Error;

    fn try_from(record: SignalRecord) -> Result<Self> {
        let district = record.district.trim().to_string();
        let state = record.state.trim().to_string();
        if district.is_empty() {
            anyhow::bail!("signal has an empty district");
        }
        if state.is_empty() {
            anyhow::bail!("signal for district '{}' has an empty state", district);
        }
        if record.risk_layers.is_empty() {
            anyhow::bail!(
                "signal for district '{}' at {} has no risk layers",
                district,
                record.timestamp.to_rfc3339()
            );
        }

        Ok(Signal {
            district,
            state,
            location: record.location.filter(|l| !l.trim().is_empty()),
            event_summary: record.event_summary,
            timestamp: record.timestamp,
            source_type: record
                .source_type
                .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
            risk_layers: record.risk_layers.into_iter().collect(),
            polarity: record.polarity,
            severity_score: clamp_severity(record.severity_score),
            geo_sensitivity: record.geo_sensitivity.into_iter().collect(),
        })
    }
}

/// Clamp any integer severity into 1..=5
pub fn clamp_severity(raw: i64) -> u8 {
    raw.clamp(MIN_SEVERITY as i64, MAX_SEVERITY as i64) as u8
}

impl Signal {
    /// Build a signal in code (no geo tags, no location, default source type)
    pub fn new(
        district: impl Into<String>,
        state: impl Into<String>,
        event_summary: impl Into<String>,
        timestamp: DateTime<Utc>,
        layers: impl IntoIterator<Item = RiskLayer>,
        polarity: Polarity,
        severity_score: u8,
    ) -> Self {
        Signal {
            district: district.into(),
            state: state.into(),
            location: None,
            event_summary: event_summary.into(),
            timestamp,
            source_type: DEFAULT_SOURCE_TYPE.to_string(),
            risk_layers: layers.into_iter().collect(),
            polarity,
            severity_score: clamp_severity(severity_score as i64),
            geo_sensitivity: BTreeSet::new(),
        }
    }

    pub fn with_geo(mut self, tags: impl IntoIterator<Item = GeoSensitivity>) -> Self {
        self.geo_sensitivity = tags.into_iter().collect();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Severity as used by the engine, clamped again in case the struct was built by hand
    pub fn severity(&self) -> u8 {
        clamp_severity(self.severity_score as i64)
    }

    pub fn has_layer(&self, layer: RiskLayer) -> bool {
        self.risk_layers.contains(&layer)
    }
}

/// Parse a JSON array of signals
pub fn parse_signals(json: &str) -> Result<Vec<Signal>> {
    serde_json::from_str(json).context("failed to parse signals JSON")
}

/// Parse a JSON array of signals, skipping records that fail validation
///
/// Returns the accepted signals and the number of rejected records. The
/// document itself must still be a JSON array.
pub fn parse_signals_lenient(json: &str) -> Result<(Vec<Signal>, usize)> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).context("signals JSON must be an array")?;
    let mut signals = Vec::with_capacity(values.len());
    let mut rejected = 0;
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Signal>(value) {
            Ok(signal) => signals.push(signal),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping invalid signal record");
                rejected += 1;
            }
        }
    }
    Ok((signals, rejected))
}

/// Load a JSON array of signals from disk
///
/// With `skip_invalid`, malformed records are dropped with a warning instead of
/// failing the whole file.
pub fn load_signals(path: &Path, skip_invalid: bool) -> Result<Vec<Signal>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signals file: {}", path.display()))?;
    let signals = if skip_invalid {
        let (signals, rejected) = parse_signals_lenient(&json)
            .with_context(|| format!("invalid signals file: {}", path.display()))?;
        if rejected > 0 {
            tracing::warn!(rejected, path = %path.display(), "dropped invalid signal records");
        }
        signals
    } else {
        parse_signals(&json).with_context(|| format!("invalid signals file: {}", path.display()))?
    };
    tracing::debug!(count = signals.len(), path = %path.display(), "loaded signals");
    Ok(signals)
}

/// Group signals by district, preserving each district's input order
pub fn group_by_district(signals: Vec<Signal>) -> BTreeMap<String, Vec<Signal>> {
    let mut grouped: BTreeMap<String, Vec<Signal>> = BTreeMap::new();
    for signal in signals {
        grouped.entry(signal.district.clone()).or_default().push(signal);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(extra: &str) -> String {
        format!(
            r#"{{
                "district": "Imphal West",
                "state": "Manipur",
                "event_summary": "Mass protest rally near market",
                "timestamp": "2024-03-01T10:00:00Z",
                "risk_layers": ["cognitive", "network"],
                "polarity": "escalatory"{}
            }}"#,
            extra
        )
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let json = record_json(r#", "severity_score": 4"#);
        let signal: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal.severity_score, 4);
        assert_eq!(signal.source_type, DEFAULT_SOURCE_TYPE);
        assert!(signal.geo_sensitivity.is_empty());
        assert!(signal.location.is_none());
        assert!(signal.has_layer(RiskLayer::Network));
        assert!(!signal.has_layer(RiskLayer::Physical));
    }

    #[test]
    fn test_severity_clamped_at_boundary() {
        let high: Signal =
            serde_json::from_str(&record_json(r#", "severity_score": 9"#)).unwrap();
        assert_eq!(high.severity_score, 5);

        let low: Signal =
            serde_json::from_str(&record_json(r#", "severity_score": -2"#)).unwrap();
        assert_eq!(low.severity_score, 1);
    }

    #[test]
    fn test_geo_tags_accept_long_names() {
        let json = record_json(
            r#", "severity_score": 3, "geo_sensitivity": ["border_area", "market", "capital_admin"]"#,
        );
        let signal: Signal = serde_json::from_str(&json).unwrap();
        let tags: Vec<_> = signal.geo_sensitivity.iter().copied().collect();
        assert_eq!(
            tags,
            vec![
                GeoSensitivity::Border,
                GeoSensitivity::Market,
                GeoSensitivity::Capital
            ]
        );
    }

    #[test]
    fn test_empty_layers_rejected() {
        let json = r#"{
            "district": "Kohima",
            "state": "Nagaland",
            "event_summary": "x",
            "timestamp": "2024-03-01T10:00:00Z",
            "risk_layers": [],
            "polarity": "neutral",
            "severity_score": 2
        }"#;
        let err = serde_json::from_str::<Signal>(json).unwrap_err();
        assert!(err.to_string().contains("no risk layers"), "{}", err);
    }

    #[test]
    fn test_blank_district_rejected() {
        let json = r#"{
            "district": "  ",
            "state": "Nagaland",
            "event_summary": "x",
            "timestamp": "2024-03-01T10:00:00Z",
            "risk_layers": ["physical"],
            "polarity": "neutral",
            "severity_score": 2
        }"#;
        assert!(serde_json::from_str::<Signal>(json).is_err());
    }

    #[test]
    fn test_duplicate_layers_collapse() {
        let json = r#"{
            "district": "Kohima",
            "state": "Nagaland",
            "event_summary": "x",
            "timestamp": "2024-03-01T10:00:00Z",
            "risk_layers": ["physical", "cognitive", "physical"],
            "polarity": "neutral",
            "severity_score": 2
        }"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.risk_layers.len(), 2);
        assert_eq!(
            signal.risk_layers.iter().next(),
            Some(&RiskLayer::Cognitive)
        );
    }

    #[test]
    fn test_lenient_parse_skips_bad_records() {
        let json = format!(
            "[{}, {}]",
            record_json(r#", "severity_score": 3"#),
            r#"{"district": "Kohima", "state": "Nagaland"}"#
        );
        assert!(parse_signals(&json).is_err());

        let (signals, rejected) = parse_signals_lenient(&json).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(rejected, 1);
        assert_eq!(signals[0].district, "Imphal West");
    }

    #[test]
    fn test_group_by_district_is_sorted() {
        let t = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let signals = vec![
            Signal::new("Tawang", "Arunachal Pradesh", "a", t, [RiskLayer::Physical], Polarity::Neutral, 2),
            Signal::new("Aizawl", "Mizoram", "b", t, [RiskLayer::Cognitive], Polarity::Neutral, 2),
            Signal::new("Tawang", "Arunachal Pradesh", "c", t, [RiskLayer::Network], Polarity::Neutral, 2),
        ];
        let grouped = group_by_district(signals);
        let keys: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(keys, vec!["Aizawl", "Tawang"]);
        assert_eq!(grouped["Tawang"][0].event_summary, "a");
        assert_eq!(grouped["Tawang"][1].event_summary, "c");
    }
}
