//! Break & Retest State Machine
//!
//! One machine per instrument, one state per direction:
//! 1. UNBROKEN - waiting for price to clear the reference level by more than the tolerance
//!    (above the range high for longs, below the range low for shorts)
//! 2. BROKEN   - level recorded; waiting for price to come back within tolerance of it
//! 3. On retest a confirmation is emitted and the direction returns to UNBROKEN
//!
//! A confirmation can only come out of BROKEN. A BROKEN state that never
//! retests expires after `ttl_secs` (checked lazily on the next evaluation).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// Configuration for break & retest detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakRetestConfig {
    /// Fractional tolerance band around the level (default: 0.002 = 0.2%)
    pub tolerance: f64,
    /// Seconds a broken level stays armed without a retest. `None` never expires.
    pub ttl_secs: Option<i64>,
}

impl Default for BreakRetestConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.002,
            ttl_secs: Some(4 * 60 * 60),
        }
    }
}

/// State of one (instrument, direction) key
#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakState {
    Unbroken,
    Broken {
        level: f64,
        broken_at: DateTime<Utc>,
    },
}

/// Confirmation emitted when a broken level is retested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retest {
    pub direction: Direction,
    pub level: f64,
    pub price: f64,
    pub broken_at: DateTime<Utc>,
}

/// Break & retest detector for a single instrument
#[derive(Debug, Clone)]
pub struct BreakRetestMachine {
    config: BreakRetestConfig,
    long: BreakState,
    short: BreakState,
}

impl BreakRetestMachine {
    pub fn new(config: BreakRetestConfig) -> Self {
        Self {
            config,
            long: BreakState::Unbroken,
            short: BreakState::Unbroken,
        }
    }

    fn slot(&mut self, direction: Direction) -> &mut BreakState {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    #[cfg(test)]
    fn state(&self, direction: Direction) -> BreakState {
        match direction {
            Direction::Long => self.long,
            Direction::Short => self.short,
        }
    }

    /// Advance the machine for `direction`. `level` is the current reference
    /// level; without one nothing is mutated.
    pub fn evaluate(
        &mut self,
        direction: Direction,
        price: f64,
        level: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<Retest> {
        let level = level.filter(|l| l.is_finite() && *l > 0.0)?;
        if !price.is_finite() {
            return None;
        }

        let tolerance = self.config.tolerance;
        // A TTL too large for a Duration never expires
        let ttl = self.config.ttl_secs.and_then(Duration::try_seconds);
        let slot = self.slot(direction);

        if let (BreakState::Broken { level: broken, broken_at }, Some(ttl)) = (*slot, ttl) {
            if now - broken_at > ttl {
                tracing::debug!(
                    "BREAK EXPIRED: {} level {:.4} broken at {} never retested",
                    direction,
                    broken,
                    broken_at
                );
                *slot = BreakState::Unbroken;
            }
        }

        match *slot {
            BreakState::Unbroken => {
                let cleared = match direction {
                    Direction::Long => price > level * (1.0 + tolerance),
                    Direction::Short => price < level * (1.0 - tolerance),
                };
                if cleared {
                    tracing::debug!("BREAK: {} level {:.4} @ {:.4}", direction, level, price);
                    *slot = BreakState::Broken {
                        level,
                        broken_at: now,
                    };
                }
                None
            }
            BreakState::Broken {
                level: broken,
                broken_at,
            } => {
                if (price - broken).abs() / broken <= tolerance {
                    *slot = BreakState::Unbroken;
                    tracing::debug!("RETEST: {} level {:.4} @ {:.4}", direction, broken, price);
                    Some(Retest {
                        direction,
                        level: broken,
                        price,
                        broken_at,
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Drop all armed levels (both directions)
    pub fn clear(&mut self) {
        self.long = BreakState::Unbroken;
        self.short = BreakState::Unbroken;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_break_then_retest_long() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        let level = 100.0;
        let t = 0.002;

        assert!(sm.evaluate(Direction::Long, level * (1.0 + 2.0 * t), Some(level), at(0)).is_none());
        assert!(matches!(sm.state(Direction::Long), BreakState::Broken { level: l, .. } if l == level));

        let retest = sm
            .evaluate(Direction::Long, level * (1.0 + 0.5 * t), Some(level), at(60))
            .unwrap();
        assert_eq!(retest.level, level);
        assert_eq!(retest.broken_at, at(0));
        assert_eq!(sm.state(Direction::Long), BreakState::Unbroken);

        // Same price again: already reset, nothing until a new break
        assert!(sm.evaluate(Direction::Long, level * (1.0 + 0.5 * t), Some(level), at(120)).is_none());
        assert_eq!(sm.state(Direction::Long), BreakState::Unbroken);
    }

    #[test]
    fn test_break_then_retest_short() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        assert!(sm.evaluate(Direction::Short, 99.5, Some(100.0), at(0)).is_none());
        assert!(sm.evaluate(Direction::Short, 99.0, Some(100.0), at(10)).is_none());
        assert!(sm.evaluate(Direction::Short, 99.9, Some(100.0), at(20)).is_some());
    }

    #[test]
    fn test_no_confirmation_without_break() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        // Sitting right on the level from UNBROKEN is not a retest
        assert!(sm.evaluate(Direction::Long, 100.0, Some(100.0), at(0)).is_none());
        assert!(sm.evaluate(Direction::Long, 100.1, Some(100.0), at(1)).is_none());
        assert_eq!(sm.state(Direction::Long), BreakState::Unbroken);
    }

    #[test]
    fn test_directions_are_independent() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));
        assert!(matches!(sm.state(Direction::Long), BreakState::Broken { .. }));
        assert_eq!(sm.state(Direction::Short), BreakState::Unbroken);
    }

    #[test]
    fn test_missing_level_does_not_mutate() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));
        let before = sm.state(Direction::Long);

        assert!(sm.evaluate(Direction::Long, 100.0, None, at(10)).is_none());
        assert_eq!(sm.state(Direction::Long), before);
    }

    #[test]
    fn test_broken_state_expires() {
        let config = BreakRetestConfig {
            ttl_secs: Some(600),
            ..Default::default()
        };
        let mut sm = BreakRetestMachine::new(config);
        sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));

        // Retest after the TTL is not confirmed
        assert!(sm.evaluate(Direction::Long, 100.1, Some(100.0), at(601)).is_none());
        assert_eq!(sm.state(Direction::Long), BreakState::Unbroken);
    }

    #[test]
    fn test_unbounded_persistence_when_ttl_disabled() {
        let config = BreakRetestConfig {
            ttl_secs: None,
            ..Default::default()
        };
        let mut sm = BreakRetestMachine::new(config);
        sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));
        assert!(sm.evaluate(Direction::Long, 100.1, Some(100.0), at(86_400 * 30)).is_some());
    }

    #[test]
    fn test_oversized_ttl_is_unbounded() {
        for ttl_secs in [i64::MAX / 10, i64::MAX] {
            let config = BreakRetestConfig {
                ttl_secs: Some(ttl_secs),
                ..Default::default()
            };
            let mut sm = BreakRetestMachine::new(config);
            sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));
            assert!(sm.evaluate(Direction::Long, 100.1, Some(100.0), at(86_400 * 30)).is_some());
        }
    }

    #[test]
    fn test_clear() {
        let mut sm = BreakRetestMachine::new(BreakRetestConfig::default());
        sm.evaluate(Direction::Long, 101.0, Some(100.0), at(0));
        sm.evaluate(Direction::Short, 99.0, Some(100.0), at(0));
        sm.clear();
        assert_eq!(sm.state(Direction::Long), BreakState::Unbroken);
        assert_eq!(sm.state(Direction::Short), BreakState::Unbroken);
    }
}
