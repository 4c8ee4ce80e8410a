//! Consolidation and false-breakout filters
//!
//! Determines whether the book is range-bound (Consolidating) or wide enough
//! to be trending, and whether a push through a liquidity zone is real.
//!
//! The consolidation threshold adapts to the instrument: once enough book
//! widths have been seen, the threshold becomes
//! `clamp(mean_width * adaptive_factor, floor_pct, ceiling_pct)`.
//! Before that the fixed `threshold_pct` applies.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::liquidity::LiquidityMap;
use crate::types::Direction;

/// Regime classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    /// Book compressed inside a narrow band - suppress signals
    Consolidating,
    /// Book wide enough for directional moves
    Trending,
}

/// Configuration for consolidation detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Fixed threshold in percent, used until the history warms up (default: 0.5)
    pub threshold_pct: f64,
    /// Derive the threshold from recent widths (default: true)
    pub adaptive: bool,
    /// Rolling window of widths kept per instrument (default: 50)
    pub window: usize,
    /// Samples required before the adaptive threshold kicks in (default: 20)
    pub min_samples: usize,
    /// Multiplier on the mean width (default: 0.75)
    pub adaptive_factor: f64,
    pub floor_pct: f64,
    pub ceiling_pct: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 0.5,
            adaptive: true,
            window: 50,
            min_samples: 20,
            adaptive_factor: 0.75,
            floor_pct: 0.1,
            ceiling_pct: 1.0,
        }
    }
}

/// Rolling book-width history for one instrument
#[derive(Debug, Clone)]
pub struct SpreadHistory {
    widths: VecDeque<f64>,
    capacity: usize,
}

impl SpreadHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            widths: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, width_pct: f64) {
        self.widths.push_back(width_pct);
        while self.widths.len() > self.capacity {
            self.widths.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.widths.is_empty() {
            return None;
        }
        Some(self.widths.iter().sum::<f64>() / self.widths.len() as f64)
    }
}

/// Threshold that applies given the history so far
pub fn consolidation_threshold(history: &SpreadHistory, config: &ConsolidationConfig) -> f64 {
    if !config.adaptive || history.len() < config.min_samples {
        return config.threshold_pct;
    }

    match history.mean() {
        // Inverted bounds resolve to the ceiling
        Some(mean) => (mean * config.adaptive_factor).max(config.floor_pct).min(config.ceiling_pct),
        None => config.threshold_pct,
    }
}

/// Result of the consolidation check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub regime: MarketRegime,
    pub width_pct: f64,
    pub threshold_pct: f64,
}

impl ConsolidationResult {
    pub fn is_consolidating(&self) -> bool {
        self.regime == MarketRegime::Consolidating
    }
}

/// Classify the book. The threshold is taken from the history before the
/// current width is recorded. Without a liquidity map there is nothing to classify.
pub fn check_consolidation(
    liquidity: Option<&LiquidityMap>,
    history: &mut SpreadHistory,
    config: &ConsolidationConfig,
) -> Option<ConsolidationResult> {
    let map = liquidity?;
    let width_pct = map.width_pct();
    if !width_pct.is_finite() {
        return None;
    }

    let threshold_pct = consolidation_threshold(history, config);
    history.push(width_pct);

    let regime = if width_pct <= threshold_pct {
        MarketRegime::Consolidating
    } else {
        MarketRegime::Trending
    };

    Some(ConsolidationResult {
        regime,
        width_pct,
        threshold_pct,
    })
}

/// Configuration for the false-breakout filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FalseBreakoutConfig {
    /// Minimum clearance beyond the zone, in percent (default: 0.05)
    pub min_clear_pct: f64,
}

impl Default for FalseBreakoutConfig {
    fn default() -> Self {
        Self {
            min_clear_pct: 0.05,
        }
    }
}

/// Breakout classification relative to the liquidity zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutVerdict {
    /// Price inside [support, resistance]
    Inside,
    /// Cleared the zone with non-opposing flow
    Genuine(Direction),
    /// Marginal clearance or flow against the move
    False(Direction),
}

impl BreakoutVerdict {
    /// A false breakout only blocks trades in the breakout's own direction
    pub fn suppresses(&self, candidate: Direction) -> bool {
        matches!(self, BreakoutVerdict::False(d) if *d == candidate)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, BreakoutVerdict::False(_))
    }
}

/// Classify price against the zones using order-flow delta
pub fn classify_breakout(
    price: f64,
    liquidity: Option<&LiquidityMap>,
    delta: f64,
    config: &FalseBreakoutConfig,
) -> BreakoutVerdict {
    let Some(map) = liquidity else {
        return BreakoutVerdict::Inside;
    };

    let (direction, level, clearance) = if price > map.resistance {
        (Direction::Long, map.resistance, price - map.resistance)
    } else if price < map.support {
        (Direction::Short, map.support, map.support - price)
    } else {
        return BreakoutVerdict::Inside;
    };

    let clear_pct = clearance / level * 100.0;
    let flow_opposes = delta * direction.sign() < 0.0;

    if clear_pct > config.min_clear_pct && !flow_opposes {
        BreakoutVerdict::Genuine(direction)
    } else {
        BreakoutVerdict::False(direction)
    }
}
