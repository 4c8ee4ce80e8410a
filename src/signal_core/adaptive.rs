//! Adaptive weighting from realized win rate

use serde::{Deserialize, Serialize};

/// Win-rate bands and the multipliers they map to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Win rate (%) above which scores are boosted (default: 60)
    pub strong_win_rate: f64,
    /// Win rate (%) below which scores are cut (default: 40)
    pub weak_win_rate: f64,
    pub boost: f64,
    pub cut: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            strong_win_rate: 60.0,
            weak_win_rate: 40.0,
            boost: 1.2,
            cut: 0.8,
        }
    }
}

impl AdaptiveConfig {
    /// Multiplier for a recent win rate; unknown means neutral
    pub fn weight(&self, win_rate: Option<f64>) -> f64 {
        match win_rate.filter(|w| w.is_finite()) {
            Some(w) if w > self.strong_win_rate => self.boost,
            Some(w) if w < self.weak_win_rate => self.cut,
            _ => 1.0,
        }
    }
}

/// Multiplier with the default bands
pub fn adaptive_weight(win_rate: Option<f64>) -> f64 {
    AdaptiveConfig::default().weight(win_rate)
}

/// Clamp a score into [0, 100]; anything non-finite becomes 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Scale a raw score by the win-rate multiplier and clamp
pub fn apply_weight(base: f64, win_rate: Option<f64>, config: &AdaptiveConfig) -> f64 {
    clamp_score(base * config.weight(win_rate))
}
