//! Stop-hunt detection
//!
//! A sweep through a liquidity zone met by aggression in the opposite
//! direction:
//! - price below support while delta is positive => bullish (longs were flushed, buyers step in)
//! - price above resistance while delta is negative => bearish

use serde::{Deserialize, Serialize};

use super::liquidity::LiquidityMap;
use crate::types::Direction;

/// Configuration for stop-hunt detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopHuntConfig {
    /// Fraction beyond the zone price must trade (default: 0.001 = 0.1%)
    pub tolerance: f64,
    /// Minimum |delta| for the reversal aggression to count (default: 0, sign only)
    pub min_delta: f64,
}

impl Default for StopHuntConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.001,
            min_delta: 0.0,
        }
    }
}

/// A detected sweep-and-reject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopHunt {
    pub direction: Direction,
    pub swept_level: f64,
    /// |delta| / 100
    pub strength: f64,
    pub reason: String,
}

/// Check for a stop hunt against the liquidity map. No map, no detection.
pub fn detect_stop_hunt(
    price: f64,
    liquidity: Option<&LiquidityMap>,
    delta: f64,
    config: &StopHuntConfig,
) -> Option<StopHunt> {
    let map = liquidity?;

    if !price.is_finite() || !delta.is_finite() || delta.abs() < config.min_delta {
        return None;
    }

    if price < map.support * (1.0 - config.tolerance) && delta > 0.0 {
        return Some(StopHunt {
            direction: Direction::Long,
            swept_level: map.support,
            strength: delta.abs() / 100.0,
            reason: format!(
                "Sweep below support {:.4} absorbed by buyers (delta {:+.2})",
                map.support, delta
            ),
        });
    }

    if price > map.resistance * (1.0 + config.tolerance) && delta < 0.0 {
        return Some(StopHunt {
            direction: Direction::Short,
            swept_level: map.resistance,
            strength: delta.abs() / 100.0,
            reason: format!(
                "Sweep above resistance {:.4} absorbed by sellers (delta {:+.2})",
                map.resistance, delta
            ),
        });
    }

    None
}
