//! Liquidity Map
//!
//! Turns a raw order book into support/resistance zones and the largest
//! resting clusters on each side.
//!
//! Support is the lowest bid and resistance the highest ask still standing
//! after cleaning, so the zones bracket the whole visible book. The map is
//! only built from a two-sided, uncrossed book.

use serde::{Deserialize, Serialize};

use crate::types::{BookLevel, OrderBook};

/// Configuration for liquidity map construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    /// Number of largest levels kept per side as clusters (default: 5)
    pub cluster_count: usize,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self { cluster_count: 5 }
    }
}

/// Support/resistance zones derived from one order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMap {
    pub support: f64,
    pub resistance: f64,
    /// Largest bids by size, descending
    pub bid_clusters: Vec<BookLevel>,
    /// Largest asks by size, descending
    pub ask_clusters: Vec<BookLevel>,
    pub total_bid_liquidity: f64,
    pub total_ask_liquidity: f64,
}

impl LiquidityMap {
    /// Distance between resistance and support as a percentage of support
    pub fn width_pct(&self) -> f64 {
        (self.resistance - self.support) / self.support * 100.0
    }
}

fn clean_levels(levels: &[BookLevel]) -> Vec<BookLevel> {
    levels
        .iter()
        .filter(|l| l.price.is_finite() && l.price > 0.0 && l.size.is_finite() && l.size > 0.0)
        .copied()
        .collect()
}

fn top_clusters(levels: &[BookLevel], count: usize) -> Vec<BookLevel> {
    let mut sorted = levels.to_vec();
    sorted.sort_by(|a, b| b.size.total_cmp(&a.size));
    sorted.truncate(count);
    sorted
}

/// Build the liquidity map. Returns `None` when either side is empty after
/// cleaning or the extremes are crossed.
pub fn build_liquidity_map(book: &OrderBook, config: &LiquidityConfig) -> Option<LiquidityMap> {
    let bids = clean_levels(&book.bids);
    let asks = clean_levels(&book.asks);

    if bids.is_empty() || asks.is_empty() {
        return None;
    }

    let support = bids.iter().map(|l| l.price).fold(f64::MAX, f64::min);
    let resistance = asks.iter().map(|l| l.price).fold(f64::MIN, f64::max);

    if support > resistance {
        tracing::debug!(
            "Crossed book extremes: support {:.4} > resistance {:.4}",
            support,
            resistance
        );
        return None;
    }

    Some(LiquidityMap {
        support,
        resistance,
        bid_clusters: top_clusters(&bids, config.cluster_count),
        ask_clusters: top_clusters(&asks, config.cluster_count),
        total_bid_liquidity: bids.iter().map(|l| l.size).sum(),
        total_ask_liquidity: asks.iter().map(|l| l.size).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBook {
        OrderBook::new(
            bids.iter().map(|&(p, s)| BookLevel::new(p, s)).collect(),
            asks.iter().map(|&(p, s)| BookLevel::new(p, s)).collect(),
        )
    }

    #[test]
    fn test_support_and_resistance_are_book_extremes() {
        let ob = book(
            &[(100.0, 10.0), (99.5, 30.0), (99.0, 5.0)],
            &[(100.6, 8.0), (101.0, 2.0), (101.5, 40.0)],
        );
        let map = build_liquidity_map(&ob, &LiquidityConfig::default()).unwrap();

        assert_eq!(map.support, 99.0);
        assert_eq!(map.resistance, 101.5);
        assert_eq!(map.total_bid_liquidity, 45.0);
        assert_eq!(map.total_ask_liquidity, 50.0);
        assert_eq!(map.bid_clusters[0], BookLevel::new(99.5, 30.0));
        assert_eq!(map.ask_clusters[0], BookLevel::new(101.5, 40.0));
    }

    #[test]
    fn test_clusters_truncated_to_count() {
        let bids: Vec<(f64, f64)> = (0..10).map(|i| (100.0 - i as f64, i as f64 + 1.0)).collect();
        let ob = book(&bids, &[(101.0, 1.0)]);
        let config = LiquidityConfig { cluster_count: 3 };
        let map = build_liquidity_map(&ob, &config).unwrap();

        let sizes: Vec<f64> = map.bid_clusters.iter().map(|l| l.size).collect();
        assert_eq!(sizes, vec![10.0, 9.0, 8.0]);
    }

    #[test]
    fn test_malformed_levels_dropped() {
        let ob = book(
            &[(f64::NAN, 10.0), (100.0, -1.0), (99.0, 2.0)],
            &[(101.0, f64::INFINITY), (102.0, 1.0)],
        );
        let map = build_liquidity_map(&ob, &LiquidityConfig::default()).unwrap();
        assert_eq!(map.support, 99.0);
        assert_eq!(map.resistance, 102.0);
        assert_eq!(map.bid_clusters.len(), 1);
    }

    #[test]
    fn test_one_sided_book_has_no_map() {
        let config = LiquidityConfig::default();
        assert!(build_liquidity_map(&book(&[(100.0, 1.0)], &[]), &config).is_none());
        assert!(build_liquidity_map(&book(&[], &[(100.0, 1.0)]), &config).is_none());
        assert!(build_liquidity_map(&book(&[(100.0, 0.0)], &[(101.0, 1.0)]), &config).is_none());
    }

    #[test]
    fn test_crossed_book_has_no_map() {
        let ob = book(&[(105.0, 1.0)], &[(101.0, 1.0)]);
        assert!(build_liquidity_map(&ob, &LiquidityConfig::default()).is_none());
    }

    #[test]
    fn test_width_and_totals() {
        let ob = book(&[(100.0, 30.0)], &[(100.6, 10.0)]);
        let map = build_liquidity_map(&ob, &LiquidityConfig::default()).unwrap();
        assert!((map.width_pct() - 0.6).abs() < 1e-9);
        assert_eq!(map.total_bid_liquidity, 30.0);
        assert_eq!(map.total_ask_liquidity, 10.0);
    }

    proptest! {
        #[test]
        fn prop_support_never_above_resistance(
            bids in prop::collection::vec((0.01f64..1e6, 0.0f64..1e4), 0..20),
            asks in prop::collection::vec((0.01f64..1e6, 0.0f64..1e4), 0..20),
        ) {
            if let Some(map) = build_liquidity_map(&book(&bids, &asks), &LiquidityConfig::default()) {
                prop_assert!(map.support <= map.resistance);
                prop_assert!(map.bid_clusters.len() <= 5);
            }
        }

        #[test]
        fn prop_uncrossed_books_always_map(
            bids in prop::collection::vec((1.0f64..100.0, 0.1f64..1e4), 1..20),
            asks in prop::collection::vec((100.0f64..200.0, 0.1f64..1e4), 1..20),
        ) {
            let map = build_liquidity_map(&book(&bids, &asks), &LiquidityConfig::default());
            prop_assert!(map.is_some());
        }
    }
}
