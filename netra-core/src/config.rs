//! Configuration file support for NE-NETRA
//!
//! Loads deployment-specific scoring parameters from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.netrarc.json` in the working directory
//! 3. `netra.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.
//! A resolved config is immutable; weight adjustments produce a new file
//! fragment rather than mutating anything in place.

use crate::composite::{LayerWeights, SigmoidParams};
use crate::engine::{EngineConfig, TimeWindow};
use crate::explain::DEFAULT_TOP_SIGNALS;
use crate::weighting::WeightingParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Largest accepted layer weight
const MAX_LAYER_WEIGHT: f64 = 10.0;

/// NE-NETRA configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetraConfig {
    /// Scoring window in hours (default: 24)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_hours: Option<i64>,

    /// Number of top signals per district (default: 3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_signals: Option<usize>,

    /// Exponential recency decay rate per day (default: 0.5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_rate: Option<f64>,

    /// Floor for the recency weight (default: 0.1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recency_weight: Option<f64>,

    /// Logistic transform parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigmoid: Option<SigmoidConfig>,

    /// Default layer weights for every district
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightConfig>,

    /// Per-district overrides, keyed by district name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub districts: BTreeMap<String, DistrictConfig>,
}

/// Logistic transform parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigmoidConfig {
    /// Linear score mapped to 50 (default: 50.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midpoint: Option<f64>,
    /// Slope of the S-curve (default: 0.1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steepness: Option<f64>,
}

/// Layer weights for the composite sum
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightConfig {
    /// Weight for the cognitive layer (default: 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive: Option<f64>,
    /// Weight for the network layer (default: 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<f64>,
    /// Weight for the physical layer (default: 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical: Option<f64>,
}

impl WeightConfig {
    /// Fill missing layers from `base`
    pub fn merge_onto(&self, base: LayerWeights) -> LayerWeights {
        LayerWeights {
            cognitive: self.cognitive.unwrap_or(base.cognitive),
            network: self.network.unwrap_or(base.network),
            physical: self.physical.unwrap_or(base.physical),
        }
    }

    /// Fully specified weight block
    pub fn from_weights(weights: LayerWeights) -> Self {
        WeightConfig {
            cognitive: Some(weights.cognitive),
            network: Some(weights.network),
            physical: Some(weights.physical),
        }
    }
}

/// Overrides for a single district
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistrictConfig {
    /// Layer weights; missing layers fall back to the global weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightConfig>,
}

/// Resolved configuration ready to hand to the engine
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl NetraConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(hours) = self.window_hours {
            TimeWindow::hours(hours).context("invalid window_hours")?;
        }

        if self.top_signals == Some(0) {
            anyhow::bail!("top_signals must be at least 1");
        }

        if let Some(rate) = self.decay_rate {
            if !rate.is_finite() || rate < 0.0 {
                anyhow::bail!("decay_rate must be non-negative (got {})", rate);
            }
        }

        if let Some(floor) = self.min_recency_weight {
            if floor.is_nan() || floor <= 0.0 || floor > 1.0 {
                anyhow::bail!("min_recency_weight must be in (0, 1] (got {})", floor);
            }
        }

        if let Some(ref s) = self.sigmoid {
            if let Some(midpoint) = s.midpoint {
                if !(0.0..=100.0).contains(&midpoint) {
                    anyhow::bail!("sigmoid.midpoint must be in [0, 100] (got {})", midpoint);
                }
            }
            if let Some(steepness) = s.steepness {
                if !steepness.is_finite() || steepness <= 0.0 {
                    anyhow::bail!("sigmoid.steepness must be positive (got {})", steepness);
                }
            }
        }

        let defaults = self.default_weights();
        if let Some(ref w) = self.weights {
            validate_weights("weights", w, defaults)?;
        }
        for (district, overrides) in &self.districts {
            if district.trim().is_empty() {
                anyhow::bail!("districts must not contain a blank district name");
            }
            if let Some(ref w) = overrides.weights {
                validate_weights(&format!("districts.{}.weights", district), w, defaults)?;
            }
        }

        Ok(())
    }

    /// Global layer weights with defaults filled in
    fn default_weights(&self) -> LayerWeights {
        match &self.weights {
            Some(w) => w.merge_onto(LayerWeights::default()),
            None => LayerWeights::default(),
        }
    }

    /// Resolve config into an immutable engine configuration
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let window = match self.window_hours {
            Some(hours) => TimeWindow::hours(hours)?,
            None => TimeWindow::default(),
        };

        let defaults = WeightingParams::default();
        let weighting = WeightingParams {
            decay_rate: self.decay_rate.unwrap_or(defaults.decay_rate),
            min_recency_weight: self
                .min_recency_weight
                .unwrap_or(defaults.min_recency_weight),
        };

        let sigmoid = match &self.sigmoid {
            Some(s) => {
                let d = SigmoidParams::default();
                SigmoidParams {
                    midpoint: s.midpoint.unwrap_or(d.midpoint),
                    steepness: s.steepness.unwrap_or(d.steepness),
                }
            }
            None => SigmoidParams::default(),
        };

        let default_weights = self.default_weights();
        let district_weights: HashMap<String, LayerWeights> = self
            .districts
            .iter()
            .filter_map(|(district, overrides)| {
                let w = overrides.weights.as_ref()?;
                Some((district.clone(), w.merge_onto(default_weights)))
            })
            .collect();

        Ok(ResolvedConfig {
            engine: EngineConfig {
                weighting,
                sigmoid,
                default_weights,
                district_weights,
                window,
                top_signals: self.top_signals.unwrap_or(DEFAULT_TOP_SIGNALS),
            },
            config_path: None,
        })
    }
}

fn validate_weights(prefix: &str, weights: &WeightConfig, base: LayerWeights) -> Result<()> {
    for (name, val) in [
        ("cognitive", weights.cognitive),
        ("network", weights.network),
        ("physical", weights.physical),
    ] {
        if let Some(v) = val {
            if !v.is_finite() || v < 0.0 {
                anyhow::bail!("{}.{} must be non-negative (got {})", prefix, name, v);
            }
            if v > MAX_LAYER_WEIGHT {
                anyhow::bail!(
                    "{}.{} must be at most {} (got {})",
                    prefix,
                    name,
                    MAX_LAYER_WEIGHT,
                    v
                );
            }
        }
    }

    if weights.merge_onto(base).total() <= 0.0 {
        anyhow::bail!("{} must not all be zero", prefix);
    }
    Ok(())
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        NetraConfig::default().resolve()
    }

    /// Config fragment recording a false-positive decay for one district
    ///
    /// Starts from the district's current effective weights, so repeated
    /// feedback compounds when the fragment is merged back into the file.
    pub fn false_positive_fragment(&self, district: &str) -> NetraConfig {
        let adjusted = self.engine.weights_for(district).after_false_positive();
        let mut districts = BTreeMap::new();
        districts.insert(
            district.to_string(),
            DistrictConfig {
                weights: Some(WeightConfig::from_weights(adjusted)),
            },
        );
        NetraConfig {
            districts,
            ..NetraConfig::default()
        }
    }
}

/// Discover and load a config file from the working directory
///
/// Search order:
/// 1. `.netrarc.json`
/// 2. `netra.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(root: &Path) -> Result<Option<(NetraConfig, PathBuf)>> {
    for name in [".netrarc.json", "netra.config.json"] {
        let path = root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<NetraConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: NetraConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from `root`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(root)? {
            Some((config, path)) => (config, Some(path)),
            None => (NetraConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let Some(ref path) = source_path {
        tracing::debug!(path = %path.display(), "loaded config file");
    }
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(json: &str) -> NetraConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = NetraConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.engine, EngineConfig::default());
        assert!(resolved.config_path.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"{
            "window_hours": 48,
            "top_signals": 5,
            "decay_rate": 0.25,
            "min_recency_weight": 0.2,
            "sigmoid": {"midpoint": 40.0, "steepness": 0.2},
            "weights": {"cognitive": 1.5, "network": 1.0, "physical": 2.0},
            "districts": {
                "Tengnoupal": {"weights": {"physical": 3.0}}
            }
        }"#,
        );
        let engine = config.resolve().unwrap().engine;
        assert_eq!(engine.window.as_hours(), 48);
        assert_eq!(engine.top_signals, 5);
        assert_eq!(engine.weighting.decay_rate, 0.25);
        assert_eq!(engine.weighting.min_recency_weight, 0.2);
        assert_eq!(engine.sigmoid.midpoint, 40.0);
        assert_eq!(engine.sigmoid.steepness, 0.2);
        assert_eq!(engine.default_weights.cognitive, 1.5);

        // District override inherits unspecified layers from the global weights
        let tengnoupal = engine.weights_for("Tengnoupal");
        assert_eq!(tengnoupal.cognitive, 1.5);
        assert_eq!(tengnoupal.network, 1.0);
        assert_eq!(tengnoupal.physical, 3.0);
        assert_eq!(engine.weights_for("Ukhrul"), engine.default_weights);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<NetraConfig, _> = serde_json::from_str(r#"{"unknown_field": true}"#);
        assert!(result.is_err(), "unknown fields should be rejected");

        let nested: Result<NetraConfig, _> =
            serde_json::from_str(r#"{"weights": {"economic": 1.0}}"#);
        assert!(nested.is_err());
    }

    #[test]
    fn test_reject_negative_weight() {
        assert!(parse(r#"{"weights": {"network": -1.0}}"#).validate().is_err());
    }

    #[test]
    fn test_reject_weight_over_10() {
        assert!(parse(r#"{"weights": {"physical": 11.0}}"#).validate().is_err());
    }

    #[test]
    fn test_reject_all_zero_weights() {
        let config = parse(r#"{"weights": {"cognitive": 0.0, "network": 0.0, "physical": 0.0}}"#);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not all be zero"));

        // Partial zeros are fine while another layer keeps weight
        assert!(parse(r#"{"weights": {"cognitive": 0.0}}"#).validate().is_ok());
    }

    #[test]
    fn test_reject_zero_district_weights_against_global() {
        let config = parse(
            r#"{
            "weights": {"cognitive": 0.0, "network": 0.0},
            "districts": {"Kiphire": {"weights": {"physical": 0.0}}}
        }"#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("districts.Kiphire.weights"));
    }

    #[test]
    fn test_reject_negative_window() {
        assert!(parse(r#"{"window_hours": -6}"#).validate().is_err());
        assert!(parse(r#"{"window_hours": 0}"#).validate().is_ok());
    }

    #[test]
    fn test_reject_bad_sigmoid() {
        assert!(parse(r#"{"sigmoid": {"steepness": 0.0}}"#).validate().is_err());
        assert!(parse(r#"{"sigmoid": {"midpoint": 120.0}}"#).validate().is_err());
    }

    #[test]
    fn test_reject_bad_recency_params() {
        assert!(parse(r#"{"decay_rate": -0.1}"#).validate().is_err());
        assert!(parse(r#"{"min_recency_weight": 0.0}"#).validate().is_err());
        assert!(parse(r#"{"min_recency_weight": 1.5}"#).validate().is_err());
        assert!(parse(r#"{"min_recency_weight": 1.0}"#).validate().is_ok());
    }

    #[test]
    fn test_reject_zero_top_signals() {
        assert!(parse(r#"{"top_signals": 0}"#).validate().is_err());
    }

    #[test]
    fn test_false_positive_fragment() {
        let config = parse(r#"{"districts": {"Mon": {"weights": {"cognitive": 0.1}}}}"#);
        let resolved = config.resolve().unwrap();
        let fragment = resolved.false_positive_fragment("Mon");
        let weights = fragment.districts["Mon"].weights.clone().unwrap();
        assert_eq!(weights.cognitive, Some(0.1));
        assert_eq!(weights.network, Some(0.95));
        assert_eq!(weights.physical, Some(1.0));

        let json = serde_json::to_string(&fragment).unwrap();
        assert!(!json.contains("window_hours"));
        assert!(json.starts_with(r#"{"districts":{"Mon":{"weights":"#));
    }

    #[test]
    fn test_discover_netrarc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".netrarc.json");
        fs::write(&config_path, r#"{"window_hours": 72}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.window_hours, Some(72));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();

        // Create both config files - .netrarc.json should win
        fs::write(dir.path().join(".netrarc.json"), r#"{"top_signals": 1}"#).unwrap();
        fs::write(dir.path().join("netra.config.json"), r#"{"top_signals": 2}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top_signals, Some(1), ".netrarc.json should take priority");
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"weights": {"physical": 2.0}}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.engine.default_weights.physical, 2.0);
        assert_eq!(resolved.config_path, Some(config_path));
    }

    #[test]
    fn test_load_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("netra.config.json");
        fs::write(&config_path, r#"{"top_signals": 0}"#).unwrap();

        let err = load_and_resolve(dir.path(), None).unwrap_err();
        assert!(format!("{:#}", err).contains("netra.config.json"));
    }
}
