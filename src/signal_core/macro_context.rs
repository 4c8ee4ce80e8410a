//! Macro context scoring
//!
//! Additive bias from external market context. Positive = bullish lean.
//! Each input degrades to zero when it is missing; the scorer never vetoes.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{LongShortRatio, MacroInputs};

/// Weights and thresholds for the macro scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    /// Bonus when open interest rose (default: 10)
    pub oi_rise_bonus: f64,
    /// Magnitude of the OI/price divergence bias (default: 10)
    pub divergence_weight: f64,
    /// Ratio above which one side of the crowd "dominates" (default: 0.55)
    pub crowd_ratio_threshold: f64,
    /// Contrarian crowd bias magnitude (default: 5)
    pub crowd_weight: f64,
    /// Aggregate liquidations that count as a spike (default: 50M)
    pub liquidation_threshold: f64,
    pub liquidation_bonus: f64,
    /// Magnitude of the max-pain bias (default: 10)
    pub max_pain_weight: f64,
    /// Magnitude of the ETF flow lag bias (default: 15)
    pub etf_weight: f64,
    /// Net-flow observations kept (default: 3)
    pub etf_window: usize,
    /// Observations needed before the ETF bias applies (default: 2)
    pub etf_min_observations: usize,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            oi_rise_bonus: 10.0,
            divergence_weight: 10.0,
            crowd_ratio_threshold: 0.55,
            crowd_weight: 5.0,
            liquidation_threshold: 50_000_000.0,
            liquidation_bonus: 10.0,
            max_pain_weight: 10.0,
            etf_weight: 15.0,
            etf_window: 3,
            etf_min_observations: 2,
        }
    }
}

/// Per-component macro contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroBreakdown {
    pub oi_change: f64,
    pub oi_divergence: f64,
    pub crowd: f64,
    pub liquidations: f64,
    pub max_pain: f64,
    pub etf_lag: f64,
}

impl MacroBreakdown {
    pub fn total(&self) -> f64 {
        self.oi_change + self.oi_divergence + self.crowd + self.liquidations + self.max_pain + self.etf_lag
    }
}

/// Rolling ETF net-flow history. Flows hit price with a 1-2 period lag, so the
/// bias follows the average of the last few observations rather than the latest.
#[derive(Debug, Clone, Default)]
pub struct EtfLagTracker {
    history: VecDeque<f64>,
}

impl EtfLagTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new observation (if any) and return the lag bias
    pub fn observe(&mut self, net_flow: Option<f64>, config: &MacroConfig) -> f64 {
        let Some(flow) = net_flow.filter(|f| f.is_finite()) else {
            return 0.0;
        };

        self.history.push_back(flow);
        while self.history.len() > config.etf_window.max(1) {
            self.history.pop_front();
        }

        if self.history.len() < config.etf_min_observations {
            return 0.0;
        }

        let avg = self.history.iter().sum::<f64>() / self.history.len() as f64;
        if avg > 0.0 {
            config.etf_weight
        } else if avg < 0.0 {
            -config.etf_weight
        } else {
            0.0
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// +bonus when open interest increased
pub fn oi_change_bias(oi_change: Option<f64>, config: &MacroConfig) -> f64 {
    match oi_change {
        Some(change) if change > 0.0 => config.oi_rise_bonus,
        _ => 0.0,
    }
}

/// Price up + OI down = short covering (bullish); price down + OI down = long covering (bearish)
pub fn oi_divergence_bias(price_change: Option<f64>, oi_change: Option<f64>, config: &MacroConfig) -> f64 {
    let (Some(price_change), Some(oi_change)) = (price_change, oi_change) else {
        return 0.0;
    };

    if oi_change < 0.0 && price_change > 0.0 {
        config.divergence_weight
    } else if oi_change < 0.0 && price_change < 0.0 {
        -config.divergence_weight
    } else {
        0.0
    }
}

/// Contrarian lean against a one-sided crowd
pub fn crowd_bias(ratio: Option<&LongShortRatio>, config: &MacroConfig) -> f64 {
    let Some(ratio) = ratio else {
        return 0.0;
    };

    if ratio.long_ratio > config.crowd_ratio_threshold {
        -config.crowd_weight
    } else if ratio.short_ratio > config.crowd_ratio_threshold {
        config.crowd_weight
    } else {
        0.0
    }
}

pub fn liquidation_bias(total: Option<f64>, config: &MacroConfig) -> f64 {
    match total {
        Some(total) if total > config.liquidation_threshold => config.liquidation_bonus,
        _ => 0.0,
    }
}

/// Price gravitates toward max pain: below it is bullish, above it bearish
pub fn max_pain_bias(max_pain: Option<f64>, price: f64, config: &MacroConfig) -> f64 {
    let Some(max_pain) = max_pain.filter(|m| m.is_finite() && *m > 0.0) else {
        return 0.0;
    };

    if price < max_pain {
        config.max_pain_weight
    } else if price > max_pain {
        -config.max_pain_weight
    } else {
        0.0
    }
}

/// Score all macro inputs. Mutates the ETF history when a flow is present.
pub fn score_macro(
    inputs: &MacroInputs,
    price: f64,
    etf: &mut EtfLagTracker,
    config: &MacroConfig,
) -> MacroBreakdown {
    MacroBreakdown {
        oi_change: oi_change_bias(inputs.open_interest_change, config),
        oi_divergence: oi_divergence_bias(inputs.price_change, inputs.open_interest_change, config),
        crowd: crowd_bias(inputs.long_short.as_ref(), config),
        liquidations: liquidation_bias(inputs.liquidations_total, config),
        max_pain: max_pain_bias(inputs.max_pain, price, config),
        etf_lag: etf.observe(inputs.etf_net_flow, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oi_rise_with_positive_etf_history() {
        let config = MacroConfig::default();
        let mut etf = EtfLagTracker::new();

        let mut inputs = MacroInputs {
            open_interest_change: Some(1_000.0),
            price_change: Some(250.0),
            etf_net_flow: Some(5.0),
            ..Default::default()
        };
        let first = score_macro(&inputs, 100.0, &mut etf, &config);
        assert_eq!(first.etf_lag, 0.0);
        assert_eq!(first.total(), 10.0);

        inputs.etf_net_flow = Some(3.0);
        let second = score_macro(&inputs, 100.0, &mut etf, &config);
        assert_eq!(second.oi_change, 10.0);
        assert_eq!(second.oi_divergence, 0.0);
        assert_eq!(second.etf_lag, 15.0);
        assert_eq!(second.total(), 25.0);
    }

    #[test]
    fn test_oi_divergence() {
        let config = MacroConfig::default();
        assert_eq!(oi_divergence_bias(Some(1.0), Some(-1.0), &config), 10.0);
        assert_eq!(oi_divergence_bias(Some(-1.0), Some(-1.0), &config), -10.0);
        assert_eq!(oi_divergence_bias(Some(1.0), Some(1.0), &config), 0.0);
        assert_eq!(oi_divergence_bias(Some(1.0), None, &config), 0.0);
    }

    #[test]
    fn test_crowd_positioning() {
        let config = MacroConfig::default();
        let longs = LongShortRatio {
            long_ratio: 0.7,
            short_ratio: 0.3,
        };
        let shorts = LongShortRatio {
            long_ratio: 0.4,
            short_ratio: 0.6,
        };
        let balanced = LongShortRatio {
            long_ratio: 0.5,
            short_ratio: 0.5,
        };
        assert_eq!(crowd_bias(Some(&longs), &config), -5.0);
        assert_eq!(crowd_bias(Some(&shorts), &config), 5.0);
        assert_eq!(crowd_bias(Some(&balanced), &config), 0.0);
        assert_eq!(crowd_bias(None, &config), 0.0);
    }

    #[test]
    fn test_liquidations_and_max_pain() {
        let config = MacroConfig::default();
        assert_eq!(liquidation_bias(Some(60_000_000.0), &config), 10.0);
        assert_eq!(liquidation_bias(Some(1_000.0), &config), 0.0);
        assert_eq!(max_pain_bias(Some(105.0), 100.0, &config), 10.0);
        assert_eq!(max_pain_bias(Some(95.0), 100.0, &config), -10.0);
        assert_eq!(max_pain_bias(Some(100.0), 100.0, &config), 0.0);
        assert_eq!(max_pain_bias(None, 100.0, &config), 0.0);
    }

    #[test]
    fn test_etf_window_rolls() {
        let config = MacroConfig::default();
        let mut etf = EtfLagTracker::new();
        etf.observe(Some(10.0), &config);
        etf.observe(Some(-1.0), &config);
        assert_eq!(etf.observe(Some(-1.0), &config), 15.0); // avg 8/3
        // 10.0 falls out of the window
        assert_eq!(etf.observe(Some(-1.0), &config), -15.0);
        assert_eq!(etf.len(), 3);
        // Missing flow leaves the history alone
        assert_eq!(etf.observe(None, &config), 0.0);
        assert_eq!(etf.len(), 3);
    }

    #[test]
    fn test_all_inputs_missing_is_neutral() {
        let mut etf = EtfLagTracker::new();
        let breakdown = score_macro(&MacroInputs::default(), 100.0, &mut etf, &MacroConfig::default());
        assert_eq!(breakdown, MacroBreakdown::default());
        assert!(etf.is_empty());
    }
}
