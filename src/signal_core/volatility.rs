//! Volatility filter and higher-timeframe bias
//!
//! Both work off optional candles attached to the snapshot. With too few
//! candles the filter passes and the bias is unknown.

use serde::{Deserialize, Serialize};

use crate::types::{Candle, Direction};

/// Configuration for the ATR volatility filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    /// ATR lookback in candles (default: 14)
    pub atr_period: usize,
    /// Minimum ATR / close ratio (default: 0.002)
    pub min_atr_ratio: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            min_atr_ratio: 0.002,
        }
    }
}

/// Average True Range over the last `period` true ranges
pub fn average_true_range(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < 2 || period == 0 {
        return None;
    }

    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| {
            let (prev, bar) = (pair[0], pair[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect();

    let recent = &true_ranges[true_ranges.len().saturating_sub(period)..];
    Some(recent.iter().sum::<f64>() / recent.len() as f64)
}

/// True when the market moves enough to trade, or when there's not enough data to tell
pub fn volatility_ok(candles: &[Candle], config: &VolatilityConfig) -> bool {
    let Some(atr) = average_true_range(candles, config.atr_period) else {
        return true;
    };
    let Some(last) = candles.last() else {
        return true;
    };
    if !atr.is_finite() || last.close <= 0.0 {
        return true;
    }

    atr / last.close >= config.min_atr_ratio
}

/// Higher-timeframe lean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtfBias {
    Bullish,
    Bearish,
    Neutral,
}

impl HtfBias {
    /// +1 aligned with `direction`, -1 against it, 0 neutral
    pub fn alignment(&self, direction: Direction) -> f64 {
        match self {
            HtfBias::Bullish => direction.sign(),
            HtfBias::Bearish => -direction.sign(),
            HtfBias::Neutral => 0.0,
        }
    }
}

/// Close above the window midpoint is bullish, below bearish
pub fn htf_bias(candles: &[Candle]) -> Option<HtfBias> {
    let last = candles.last()?;
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let mid = (high + low) / 2.0;

    Some(if last.close > mid {
        HtfBias::Bullish
    } else if last.close < mid {
        HtfBias::Bearish
    } else {
        HtfBias::Neutral
    })
}
