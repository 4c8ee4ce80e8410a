//! Signal Engine
//!
//! Runs one snapshot through the detector stack and the emission gate:
//!
//! 1. SESSION: no active session -> skipped, nothing touched
//! 2. DETECT: range, liquidity, order flow, stop hunt, break & retest,
//!    consolidation, breakout verdict, macro context
//! 3. CANDIDATE: stop hunt > confirmed retest > delta sign
//! 4. SCORE: composite score for the candidate direction
//! 5. GATE: kill zone, threshold, filters, cooldown, capital guard
//! 6. EMIT: trade plan + tags, cooldown stamped
//!
//! Per-instrument state lives in a `DashMap`. An evaluation holds its
//! instrument's entry for the whole read-modify-write, so two evaluations of
//! the same instrument never interleave while distinct instruments run in
//! parallel.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use super::break_retest::BreakRetestMachine;
use super::consolidation::{check_consolidation, classify_breakout, BreakoutVerdict, SpreadHistory};
use super::liquidity::build_liquidity_map;
use super::macro_context::{score_macro, EtfLagTracker};
use super::orderflow::aggregate_order_flow;
use super::range::{RangeState, RangeTracker};
use super::risk::{build_trade_plan, CapitalGuard};
use super::scorer::{composite_score, ScoreInputs, SignalScore};
use super::sessions::SessionClock;
use super::stop_hunt::detect_stop_hunt;
use super::volatility::{htf_bias, volatility_ok};
use crate::config::SignalConfig;
use crate::replay::ReplayFrame;
use crate::types::{Direction, MarketContext, MarketSnapshot, SignalTags, TradeSignal};

/// Why a snapshot was not evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutOfSession,
    InvalidPrice,
    NoDirection,
}

/// Why a scored candidate was not emitted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    OutsideKillZone,
    BelowThreshold,
    Consolidating,
    FalseBreakout,
    LowVolatility,
    Cooldown { remaining_secs: i64 },
    CapitalGuard,
}

/// Outcome of one evaluation
#[derive(Debug, Clone)]
pub enum Decision {
    Skipped(SkipReason),
    Rejected { score: SignalScore, reason: RejectReason },
    Emitted(TradeSignal),
}

impl Decision {
    pub fn signal(&self) -> Option<&TradeSignal> {
        match self {
            Decision::Emitted(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, Decision::Emitted(_))
    }
}

/// Everything the engine remembers about one instrument
#[derive(Debug, Clone)]
struct InstrumentState {
    range: RangeTracker,
    break_retest: BreakRetestMachine,
    spreads: SpreadHistory,
    etf: EtfLagTracker,
    last_signal_at: Option<DateTime<Utc>>,
}

impl InstrumentState {
    fn new(config: &SignalConfig) -> Self {
        Self {
            range: RangeTracker::new(),
            break_retest: BreakRetestMachine::new(config.break_retest.clone()),
            spreads: SpreadHistory::new(config.consolidation.window),
            etf: EtfLagTracker::new(),
            last_signal_at: None,
        }
    }
}

pub struct SignalEngine {
    config: SignalConfig,
    clock: SessionClock,
    instruments: DashMap<String, InstrumentState>,
    guard: CapitalGuard,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        let clock = SessionClock::new(config.sessions.clone())?;
        let guard = CapitalGuard::new(config.capital_guard.clone());

        Ok(Self {
            config,
            clock,
            instruments: DashMap::new(),
            guard,
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Evaluate one snapshot
    pub fn evaluate(&self, snapshot: &MarketSnapshot, context: &MarketContext) -> Decision {
        let price = snapshot.price;
        let now = snapshot.captured_at;

        if !price.is_finite() || price <= 0.0 {
            debug!("SKIP: {} invalid price {}", snapshot.instrument, price);
            return Decision::Skipped(SkipReason::InvalidPrice);
        }

        let Some(session) = self.clock.session_at(now) else {
            debug!("SKIP: {} outside sessions @ {}", snapshot.instrument, now);
            return Decision::Skipped(SkipReason::OutOfSession);
        };

        let mut state = self
            .instruments
            .entry(snapshot.instrument.clone())
            .or_insert_with(|| InstrumentState::new(&self.config));
        let state = state.value_mut();

        // Range first, so the reference levels include this print
        let previous_date = state.range.current().map(|r| r.session_date);
        state
            .range
            .observe(price, self.clock.local_date(now), self.clock.in_reference_session(now));
        let range = state.range.current();

        // Breaks armed against the previous range are void once it rolls over
        if previous_date.is_some() && range.map(|r| r.session_date) != previous_date {
            state.break_retest.clear();
        }

        let liquidity = build_liquidity_map(&snapshot.order_book, &self.config.liquidity);
        let flow = aggregate_order_flow(&snapshot.trades);
        let stop_hunt = detect_stop_hunt(price, liquidity.as_ref(), flow.delta, &self.config.stop_hunt);

        // Both directions advance every cycle
        let long_retest = state.break_retest.evaluate(
            Direction::Long,
            price,
            range.map(|r| r.level_for(Direction::Long)),
            now,
        );
        let short_retest = state.break_retest.evaluate(
            Direction::Short,
            price,
            range.map(|r| r.level_for(Direction::Short)),
            now,
        );

        let consolidation = check_consolidation(
            liquidity.as_ref(),
            &mut state.spreads,
            &self.config.consolidation,
        );
        let consolidating = consolidation.map_or(false, |c| c.is_consolidating());
        let breakout = classify_breakout(price, liquidity.as_ref(), flow.delta, &self.config.false_breakout);
        let macro_score = score_macro(&context.macro_inputs, price, &mut state.etf, &self.config.macro_context);

        let direction = stop_hunt
            .as_ref()
            .map(|hunt| hunt.direction)
            .or_else(|| long_retest.as_ref().map(|r| r.direction))
            .or_else(|| short_retest.as_ref().map(|r| r.direction))
            .or_else(|| flow.bias());

        let Some(direction) = direction else {
            debug!("SKIP: {} no directional candidate", snapshot.instrument);
            return Decision::Skipped(SkipReason::NoDirection);
        };

        let retest_confirmed = match direction {
            Direction::Long => long_retest.is_some(),
            Direction::Short => short_retest.is_some(),
        };
        let kill_zone = self.clock.kill_zone_at(now);

        let score = composite_score(
            &ScoreInputs {
                direction,
                in_kill_zone: kill_zone.is_some(),
                break_retest: retest_confirmed,
                delta: flow.delta,
                has_liquidity: liquidity.is_some(),
                stop_hunt: stop_hunt.is_some(),
                consolidating,
                htf_bias: htf_bias(&snapshot.htf_candles),
                macro_bias: macro_score.total(),
                win_rate: context.win_rate,
            },
            &self.config.weights,
            &self.config.adaptive,
        );

        let gate = &self.config.gate;
        let reject = if gate.require_kill_zone && kill_zone.is_none() {
            Some(RejectReason::OutsideKillZone)
        } else if score.value < gate.score_threshold {
            Some(RejectReason::BelowThreshold)
        } else if gate.suppress_on_consolidation && consolidating {
            Some(RejectReason::Consolidating)
        } else if gate.suppress_on_false_breakout && breakout.suppresses(direction) {
            Some(RejectReason::FalseBreakout)
        } else if gate.require_volatility && !volatility_ok(&snapshot.candles, &self.config.volatility) {
            Some(RejectReason::LowVolatility)
        } else if let Some(remaining_secs) = cooldown_remaining(state.last_signal_at, now, gate.cooldown_secs) {
            Some(RejectReason::Cooldown { remaining_secs })
        } else if !self.guard.trading_allowed() {
            Some(RejectReason::CapitalGuard)
        } else {
            None
        };

        if let Some(reason) = reject {
            debug!(
                "REJECT: {} {} score {:.2} ({:?})",
                snapshot.instrument, direction, score.value, reason
            );
            return Decision::Rejected { score, reason };
        }

        let Some(plan) = build_trade_plan(price, direction, &self.config.risk) else {
            return Decision::Skipped(SkipReason::InvalidPrice);
        };

        state.last_signal_at = Some(now);

        let signal = TradeSignal {
            id: Uuid::new_v4(),
            instrument: snapshot.instrument.clone(),
            direction,
            captured_at: now,
            price,
            entry_low: plan.entry_low,
            entry_high: plan.entry_high,
            stop_loss: plan.stop_loss,
            take_profit_1: plan.take_profit_1,
            take_profit_2: plan.take_profit_2,
            risk_pct: plan.risk_pct,
            score: score.value,
            delta: flow.delta,
            macro_score: macro_score.total(),
            tags: SignalTags {
                session,
                kill_zone,
                break_retest: retest_confirmed,
                stop_hunt: stop_hunt.is_some(),
                consolidation: consolidating,
                false_breakout: breakout.is_false(),
            },
        };

        info!(
            "SIGNAL: {} {} @ {:.4} | score {:.2} | SL {:.2} TP1 {:.2} TP2 {:.2}",
            signal.instrument,
            signal.direction,
            signal.price,
            signal.score,
            signal.stop_loss,
            signal.take_profit_1,
            signal.take_profit_2
        );
        if let Some(hunt) = &stop_hunt {
            debug!("  stop hunt: {}", hunt.reason);
        }
        if let BreakoutVerdict::False(d) = breakout {
            debug!("  faded false {} breakout", d);
        }

        Decision::Emitted(signal)
    }

    /// Evaluate a cycle's frames in parallel. Results keep the input order.
    pub fn evaluate_cycle(&self, frames: &[ReplayFrame]) -> Vec<Decision> {
        frames
            .par_iter()
            .map(|frame| self.evaluate(&frame.snapshot, &frame.context))
            .collect()
    }

    /// Feed a realized trade outcome to the capital guard
    pub fn record_outcome(&self, pnl: f64) {
        self.guard.record_outcome(pnl);
    }

    /// Drop all state held for `instrument`
    pub fn reset_instrument(&self, instrument: &str) -> bool {
        self.instruments.remove(instrument).is_some()
    }

    /// Current reference range for `instrument`
    pub fn range(&self, instrument: &str) -> Option<RangeState> {
        self.instruments.get(instrument).and_then(|s| s.range.current())
    }

    pub fn last_signal_at(&self, instrument: &str) -> Option<DateTime<Utc>> {
        self.instruments.get(instrument).and_then(|s| s.last_signal_at)
    }

    pub fn tracked_instruments(&self) -> usize {
        self.instruments.len()
    }
}

fn cooldown_remaining(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown_secs: u64) -> Option<i64> {
    let last = last?;
    let secs = i64::try_from(cooldown_secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    let window = Duration::seconds(secs);
    let elapsed = now - last;
    (elapsed < window).then(|| (window - elapsed).num_seconds())
}
