//! Configuration for the signal engine
//!
//! One `SignalConfig` aggregates the per-detector configs. Every field has a
//! default, so a JSON file only needs to list what it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::signal_core::{
    AdaptiveConfig, BreakRetestConfig, CapitalGuardConfig, ConsolidationConfig,
    FalseBreakoutConfig, LiquidityConfig, MacroConfig, RiskConfig, ScoreWeights, SessionConfig,
    StopHuntConfig, VolatilityConfig,
};

/// Rejected configuration values
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be non-negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{name} bounds are invalid: floor {floor} > ceiling {ceiling}")]
    InvertedBounds { name: &'static str, floor: f64, ceiling: f64 },

    #[error("liquidity cluster count must be at least 1")]
    ZeroClusterCount,

    #[error("score threshold {0} outside [0, 100]")]
    ThresholdOutOfRange(f64),

    #[error("hour window {name} is invalid: {start}..{end}")]
    InvalidWindow { name: String, start: u32, end: u32 },

    #[error("unknown time zone: {0}")]
    UnknownTimezone(String),
}

/// Emission gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum composite score to emit (default: 60)
    pub score_threshold: f64,
    /// Minimum seconds between signals for one instrument (default: 300)
    pub cooldown_secs: u64,
    /// Only emit inside a kill zone (default: true)
    pub require_kill_zone: bool,
    /// Suppress while the book is consolidating (default: true)
    pub suppress_on_consolidation: bool,
    /// Suppress candidates that ride a false breakout (default: true)
    pub suppress_on_false_breakout: bool,
    /// Suppress when the ATR filter fails (default: true)
    pub require_volatility: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            score_threshold: 60.0,
            cooldown_secs: 300,
            require_kill_zone: true,
            suppress_on_consolidation: true,
            suppress_on_false_breakout: true,
            require_volatility: true,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub liquidity: LiquidityConfig,
    pub stop_hunt: StopHuntConfig,
    pub break_retest: BreakRetestConfig,
    pub consolidation: ConsolidationConfig,
    pub false_breakout: FalseBreakoutConfig,
    pub macro_context: MacroConfig,
    pub adaptive: AdaptiveConfig,
    pub weights: ScoreWeights,
    pub sessions: SessionConfig,
    pub volatility: VolatilityConfig,
    pub risk: RiskConfig,
    pub capital_guard: CapitalGuardConfig,
    pub gate: GateConfig,
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

impl SignalConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SignalConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liquidity.cluster_count == 0 {
            return Err(ConfigError::ZeroClusterCount);
        }
        positive("stop_hunt.tolerance", self.stop_hunt.tolerance)?;
        positive("break_retest.tolerance", self.break_retest.tolerance)?;
        if let Some(ttl) = self.break_retest.ttl_secs {
            positive("break_retest.ttl_secs", ttl as f64)?;
        }
        positive("consolidation.threshold_pct", self.consolidation.threshold_pct)?;
        positive("consolidation.window", self.consolidation.window as f64)?;
        positive("consolidation.adaptive_factor", self.consolidation.adaptive_factor)?;
        let (floor, ceiling) = (self.consolidation.floor_pct, self.consolidation.ceiling_pct);
        if !floor.is_finite() || !ceiling.is_finite() || floor > ceiling {
            return Err(ConfigError::InvertedBounds {
                name: "consolidation",
                floor,
                ceiling,
            });
        }
        positive("risk.stop_pct", self.risk.stop_pct)?;
        positive("weights.delta_scale", self.weights.delta_scale)?;
        if !(self.weights.delta_cap >= 0.0 && self.weights.delta_cap.is_finite()) {
            return Err(ConfigError::Negative {
                field: "weights.delta_cap",
                value: self.weights.delta_cap,
            });
        }

        let threshold = self.gate.score_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }

        self.sessions.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SignalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate.score_threshold, 60.0);
        assert_eq!(config.gate.cooldown_secs, 300);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SignalConfig::default();
        config.liquidity.cluster_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroClusterCount));

        let mut config = SignalConfig::default();
        config.break_retest.tolerance = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "break_retest.tolerance", .. })
        ));

        let mut config = SignalConfig::default();
        config.gate.score_threshold = 120.0;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(120.0)));

        let mut config = SignalConfig::default();
        config.consolidation.floor_pct = 2.0;
        config.consolidation.ceiling_pct = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBounds { name: "consolidation", .. })
        ));

        let mut config = SignalConfig::default();
        config.consolidation.floor_pct = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvertedBounds { .. })));

        let mut config = SignalConfig::default();
        config.consolidation.adaptive_factor = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "consolidation.adaptive_factor", .. })
        ));

        let mut config = SignalConfig::default();
        config.weights.delta_cap = -1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "weights.delta_cap",
                value: -1.0
            })
        );

        let mut config = SignalConfig::default();
        config.sessions.timezone = "Nowhere/Special".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTimezone(_))));
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"gate": {{"score_threshold": 45}}, "sessions": {{"timezone": "Europe/London"}}}}"#
        )
        .unwrap();

        let config = SignalConfig::load(file.path()).unwrap();
        assert_eq!(config.gate.score_threshold, 45.0);
        assert_eq!(config.gate.cooldown_secs, 300);
        assert_eq!(config.sessions.timezone, "Europe/London");
        assert_eq!(config.liquidity.cluster_count, 5);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"gate": {{"score_threshold": -1}}}}"#).unwrap();
        assert!(SignalConfig::load(file.path()).is_err());
    }
}
