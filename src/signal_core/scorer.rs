//! Composite Scoring
//!
//! Combines detector outputs into one bounded score for a candidate direction:
//!
//! | component          | hit   | miss  |
//! |--------------------|-------|-------|
//! | kill zone          | +20   | -10   |
//! | break & retest     | +25   | -15   |
//! | order flow         | min(\|delta\| / 10, 25) |
//! | liquidity map      | +15   | -10   |
//! | stop hunt          | +10   | 0     |
//! | consolidating      | -10   | 0     |
//! | HTF alignment      | ±10 (0 neutral/unknown) |
//! | macro bias         | added for longs, subtracted for shorts |
//!
//! The sum is scaled by the adaptive weight and clamped to [0, 100].

use serde::{Deserialize, Serialize};

use super::adaptive::{apply_weight, AdaptiveConfig};
use super::volatility::HtfBias;
use crate::types::Direction;

/// Component weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub kill_zone_bonus: f64,
    pub kill_zone_penalty: f64,
    pub break_retest_bonus: f64,
    pub break_retest_penalty: f64,
    /// Delta units per score point (default: 10)
    pub delta_scale: f64,
    /// Cap on the order-flow contribution (default: 25)
    pub delta_cap: f64,
    pub liquidity_bonus: f64,
    pub liquidity_penalty: f64,
    pub stop_hunt_bonus: f64,
    pub consolidation_penalty: f64,
    pub htf_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            kill_zone_bonus: 20.0,
            kill_zone_penalty: 10.0,
            break_retest_bonus: 25.0,
            break_retest_penalty: 15.0,
            delta_scale: 10.0,
            delta_cap: 25.0,
            liquidity_bonus: 15.0,
            liquidity_penalty: 10.0,
            stop_hunt_bonus: 10.0,
            consolidation_penalty: 10.0,
            htf_weight: 10.0,
        }
    }
}

/// Detector outputs feeding the score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInputs {
    pub direction: Direction,
    pub in_kill_zone: bool,
    pub break_retest: bool,
    pub delta: f64,
    pub has_liquidity: bool,
    pub stop_hunt: bool,
    pub consolidating: bool,
    pub htf_bias: Option<HtfBias>,
    /// Bullish-positive macro bias
    pub macro_bias: f64,
    pub win_rate: Option<f64>,
}

/// What each component contributed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub kill_zone: f64,
    pub break_retest: f64,
    pub order_flow: f64,
    pub liquidity: f64,
    pub stop_hunt: f64,
    pub consolidation: f64,
    pub htf: f64,
    pub macro_context: f64,
    /// Sum before weighting
    pub base: f64,
    pub weight: f64,
}

/// Final composite score for one direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    /// Clamped to [0, 100], rounded to 2 decimals
    pub value: f64,
    pub direction: Direction,
    pub components: ScoreComponents,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn composite_score(
    inputs: &ScoreInputs,
    weights: &ScoreWeights,
    adaptive: &AdaptiveConfig,
) -> SignalScore {
    let order_flow = if weights.delta_scale > 0.0 {
        finite_or_zero(inputs.delta.abs() / weights.delta_scale)
            .min(weights.delta_cap)
            .max(0.0)
    } else {
        0.0
    };

    let mut c = ScoreComponents {
        kill_zone: if inputs.in_kill_zone {
            weights.kill_zone_bonus
        } else {
            -weights.kill_zone_penalty
        },
        break_retest: if inputs.break_retest {
            weights.break_retest_bonus
        } else {
            -weights.break_retest_penalty
        },
        order_flow,
        liquidity: if inputs.has_liquidity {
            weights.liquidity_bonus
        } else {
            -weights.liquidity_penalty
        },
        stop_hunt: if inputs.stop_hunt { weights.stop_hunt_bonus } else { 0.0 },
        consolidation: if inputs.consolidating {
            -weights.consolidation_penalty
        } else {
            0.0
        },
        htf: inputs
            .htf_bias
            .map(|bias| bias.alignment(inputs.direction) * weights.htf_weight)
            .unwrap_or(0.0),
        macro_context: finite_or_zero(inputs.macro_bias * inputs.direction.sign()),
        base: 0.0,
        weight: adaptive.weight(inputs.win_rate),
    };

    c.base = c.kill_zone
        + c.break_retest
        + c.order_flow
        + c.liquidity
        + c.stop_hunt
        + c.consolidation
        + c.htf
        + c.macro_context;

    let value = (apply_weight(c.base, inputs.win_rate, adaptive) * 100.0).round() / 100.0;

    SignalScore {
        value,
        direction: inputs.direction,
        components: c,
    }
}
