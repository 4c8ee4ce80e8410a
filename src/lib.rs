// Library crate - exports shared types and the signal pipeline

pub mod types;
pub mod config;
pub mod signal_core;
pub mod journal;
pub mod notify;
pub mod replay;

// Re-export commonly used types
pub use types::*;
pub use config::{ConfigError, GateConfig, SignalConfig};
pub use signal_core::{Decision, SignalEngine};
