//! Order flow aggregation for one trade sample

use serde::{Deserialize, Serialize};

use crate::types::{Direction, TradePrint, TradeSide};

/// Directional pressure over a trade sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFlowMetrics {
    /// Buy volume minus sell volume
    pub delta: f64,
    /// Running delta over the sample; same-cycle measure, equal to `delta` at the end
    pub cvd: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    /// Volume with no recognizable aggressor side, excluded from delta
    pub unknown_volume: f64,
    pub trade_count: usize,
}

impl OrderFlowMetrics {
    /// Direction the flow leans, if any
    pub fn bias(&self) -> Option<Direction> {
        if self.delta > 0.0 {
            Some(Direction::Long)
        } else if self.delta < 0.0 {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

/// Aggregate a trade list into delta / CVD. Trades with a missing, negative
/// or non-finite size are skipped.
pub fn aggregate_order_flow(trades: &[TradePrint]) -> OrderFlowMetrics {
    let mut metrics = OrderFlowMetrics::default();

    for trade in trades {
        let Some(size) = trade.size.filter(|s| s.is_finite() && *s >= 0.0) else {
            continue;
        };

        match trade.side {
            TradeSide::Buy => {
                metrics.buy_volume += size;
                metrics.cvd += size;
            }
            TradeSide::Sell => {
                metrics.sell_volume += size;
                metrics.cvd -= size;
            }
            TradeSide::Unknown => metrics.unknown_volume += size,
        }
        metrics.trade_count += 1;
    }

    metrics.delta = metrics.buy_volume - metrics.sell_volume;
    metrics
}
