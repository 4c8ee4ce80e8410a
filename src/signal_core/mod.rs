//! Signal Core - detection and scoring pipeline
//!
//! Leaf-first:
//! - Liquidity map from the order book
//! - Order flow delta / CVD from trade prints
//! - Reference-session range tracking
//! - Stop-hunt detection
//! - Break & retest state machine
//! - Consolidation and false-breakout filters
//! - Macro context bias
//! - Adaptive weighting
//! - Composite score, gate and trade plan
//! - Engine tying it together per instrument

pub mod liquidity;
pub mod orderflow;
pub mod range;
pub mod stop_hunt;
pub mod break_retest;
pub mod consolidation;
pub mod macro_context;
pub mod adaptive;
pub mod sessions;
pub mod volatility;
pub mod risk;
pub mod scorer;
pub mod engine;

// Re-export commonly used types
pub use liquidity::{build_liquidity_map, LiquidityConfig, LiquidityMap};
pub use orderflow::{aggregate_order_flow, OrderFlowMetrics};
pub use range::{RangeState, RangeTracker};
pub use stop_hunt::{detect_stop_hunt, StopHunt, StopHuntConfig};
pub use break_retest::{BreakRetestConfig, BreakRetestMachine, Retest};
pub use consolidation::{
    check_consolidation, classify_breakout, BreakoutVerdict, ConsolidationConfig,
    ConsolidationResult, FalseBreakoutConfig, MarketRegime, SpreadHistory,
};
pub use macro_context::{score_macro, EtfLagTracker, MacroBreakdown, MacroConfig};
pub use adaptive::{adaptive_weight, apply_weight, clamp_score, AdaptiveConfig};
pub use sessions::{HourWindow, SessionClock, SessionConfig};
pub use volatility::{average_true_range, htf_bias, volatility_ok, HtfBias, VolatilityConfig};
pub use risk::{build_trade_plan, CapitalGuard, CapitalGuardConfig, RiskConfig, TradePlan};
pub use scorer::{composite_score, ScoreComponents, ScoreInputs, ScoreWeights, SignalScore};
pub use engine::{Decision, RejectReason, SignalEngine, SkipReason};
