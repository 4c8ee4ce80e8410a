//! Trade plan construction and the capital guard
//!
//! The plan is a fixed percentage-offset policy around the signal price:
//! entry zone `price ± entry_band_pct`, stop `stop_pct` away, targets at
//! `tp1_rr` / `tp2_rr` multiples of the stop distance.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::Direction;

/// Configuration for trade plan levels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Half-width of the entry zone in percent (default: 0.1)
    pub entry_band_pct: f64,
    /// Stop distance in percent of price (default: 0.5)
    pub stop_pct: f64,
    /// First target in multiples of the stop distance (default: 2.0)
    pub tp1_rr: f64,
    /// Second target in multiples of the stop distance (default: 3.0)
    pub tp2_rr: f64,
    /// Account risk per trade in percent, informational (default: 0.5)
    pub risk_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            entry_band_pct: 0.1,
            stop_pct: 0.5,
            tp1_rr: 2.0,
            tp2_rr: 3.0,
            risk_pct: 0.5,
        }
    }
}

/// Entry / stop / target levels for one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_pct: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the plan for `direction` at `price`. `None` for a non-positive price.
pub fn build_trade_plan(price: f64, direction: Direction, config: &RiskConfig) -> Option<TradePlan> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }

    let band = price * config.entry_band_pct / 100.0;
    let stop_distance = price * config.stop_pct / 100.0;
    let sign = direction.sign();

    Some(TradePlan {
        entry_low: round2(price - band),
        entry_high: round2(price + band),
        stop_loss: round2(price - sign * stop_distance),
        take_profit_1: round2(price + sign * stop_distance * config.tp1_rr),
        take_profit_2: round2(price + sign * stop_distance * config.tp2_rr),
        risk_pct: config.risk_pct,
    })
}

/// Configuration for the capital guard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapitalGuardConfig {
    /// Consecutive non-winning outcomes that halt emission (default: 3)
    pub max_consecutive_losses: usize,
}

impl Default for CapitalGuardConfig {
    fn default() -> Self {
        Self {
            max_consecutive_losses: 3,
        }
    }
}

/// Halts signal emission after a streak of losing outcomes.
///
/// Outcomes come from the statistics collaborator; the guard is shared across
/// instruments and safe to use from parallel evaluations.
#[derive(Debug)]
pub struct CapitalGuard {
    config: CapitalGuardConfig,
    recent: RwLock<VecDeque<f64>>,
}

impl CapitalGuard {
    pub fn new(config: CapitalGuardConfig) -> Self {
        Self {
            config,
            recent: RwLock::new(VecDeque::new()),
        }
    }

    /// Record a realized PnL. Non-finite values are ignored.
    pub fn record_outcome(&self, pnl: f64) {
        if self.config.max_consecutive_losses == 0 || !pnl.is_finite() {
            return;
        }
        let mut recent = self.recent.write();
        recent.push_back(pnl);
        while recent.len() > self.config.max_consecutive_losses {
            recent.pop_front();
        }
    }

    /// False once the last N outcomes were all losses or scratches
    pub fn trading_allowed(&self) -> bool {
        let limit = self.config.max_consecutive_losses;
        if limit == 0 {
            return true;
        }
        let recent = self.recent.read();
        recent.len() < limit || !recent.iter().all(|pnl| *pnl <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_plan() {
        let plan = build_trade_plan(100.0, Direction::Long, &RiskConfig::default()).unwrap();
        assert_eq!(plan.entry_low, 99.9);
        assert_eq!(plan.entry_high, 100.1);
        assert_eq!(plan.stop_loss, 99.5);
        assert_eq!(plan.take_profit_1, 101.0);
        assert_eq!(plan.take_profit_2, 101.5);
        assert_eq!(plan.risk_pct, 0.5);
    }

    #[test]
    fn test_short_plan() {
        let plan = build_trade_plan(2000.0, Direction::Short, &RiskConfig::default()).unwrap();
        assert_eq!(plan.entry_low, 1998.0);
        assert_eq!(plan.entry_high, 2002.0);
        assert_eq!(plan.stop_loss, 2010.0);
        assert_eq!(plan.take_profit_1, 1980.0);
        assert_eq!(plan.take_profit_2, 1970.0);
    }

    #[test]
    fn test_invalid_price_has_no_plan() {
        let config = RiskConfig::default();
        assert!(build_trade_plan(0.0, Direction::Long, &config).is_none());
        assert!(build_trade_plan(f64::NAN, Direction::Long, &config).is_none());
    }

    #[test]
    fn test_guard_halts_after_losing_streak() {
        let guard = CapitalGuard::new(CapitalGuardConfig::default());
        assert!(guard.trading_allowed());

        guard.record_outcome(-1.0);
        guard.record_outcome(0.0);
        assert!(guard.trading_allowed());

        guard.record_outcome(-2.5);
        assert!(!guard.trading_allowed());

        // A win breaks the streak
        guard.record_outcome(4.0);
        assert!(guard.trading_allowed());
    }

    #[test]
    fn test_guard_disabled() {
        let guard = CapitalGuard::new(CapitalGuardConfig {
            max_consecutive_losses: 0,
        });
        for _ in 0..10 {
            guard.record_outcome(-1.0);
        }
        assert!(guard.trading_allowed());
    }

    #[test]
    fn test_guard_with_huge_limit() {
        let guard = CapitalGuard::new(CapitalGuardConfig {
            max_consecutive_losses: usize::MAX,
        });
        for _ in 0..100 {
            guard.record_outcome(-1.0);
        }
        assert!(guard.trading_allowed());
        assert_eq!(guard.recent.read().len(), 100);
    }

    #[test]
    fn test_guard_ignores_non_finite_outcomes() {
        let guard = CapitalGuard::new(CapitalGuardConfig::default());
        guard.record_outcome(-1.0);
        guard.record_outcome(-1.0);
        guard.record_outcome(f64::NAN);
        assert!(guard.trading_allowed());
        guard.record_outcome(-1.0);
        assert!(!guard.trading_allowed());
    }
}
