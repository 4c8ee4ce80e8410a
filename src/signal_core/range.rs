//! Reference-session range tracking
//!
//! Keeps the high/low printed during the reference session (Asia by default).
//! The range only widens while that session is active and is read-only
//! afterwards. The first reference-session observation on a new date starts
//! a fresh range.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// High/low of the reference session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeState {
    pub high: f64,
    pub low: f64,
    pub session_date: NaiveDate,
}

impl RangeState {
    fn new(price: f64, session_date: NaiveDate) -> Self {
        Self {
            high: price,
            low: price,
            session_date,
        }
    }

    fn widen(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
    }

    /// Level a break in `direction` has to clear: the high for longs, the low for shorts
    pub fn level_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.high,
            Direction::Short => self.low,
        }
    }
}

/// Per-instrument range tracker
#[derive(Debug, Clone, Default)]
pub struct RangeTracker {
    state: Option<RangeState>,
}

impl RangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a price. Only mutates while `in_reference_session` is true.
    pub fn observe(&mut self, price: f64, date: NaiveDate, in_reference_session: bool) {
        if !in_reference_session || !price.is_finite() || price <= 0.0 {
            return;
        }

        match self.state {
            Some(ref mut range) if range.session_date == date => range.widen(price),
            Some(ref range) => {
                tracing::debug!(
                    "RANGE: rollover {} -> {} (prev H={:.4} L={:.4})",
                    range.session_date,
                    date,
                    range.high,
                    range.low
                );
                self.state = Some(RangeState::new(price, date));
            }
            None => self.state = Some(RangeState::new(price, date)),
        }
    }

    pub fn current(&self) -> Option<RangeState> {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}
