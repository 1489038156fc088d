//! # sg-signals: Signal rules and the transition engine
//!
//! Turns catalog rules into evaluation units, classifies each unit's
//! candles with its rule, compares the result with the stored position and
//! emits a close/open sequence only when the position changes.
//!
//! ## Core Components
//!
//! - **Indicators**: EMA over a closing-price window
//! - **SignalRule**: EMA (price vs. lagged EMA) and CDC (12/26 crossover)
//! - **Grouper**: Distinct evaluation units per tick
//! - **Transition**: Pure `decide(stored, signal)`
//! - **SignalEngine**: Concurrent, cancellable batch over all units
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sg_signals::{decide, SignalRule, Transition};
//! use sg_storage::Position;
//!
//! let closes: Vec<f64> = (1..=30).map(f64::from).collect();
//! let signal = SignalRule::Ema { period: 15 }.classify(&closes).unwrap();
//!
//! match decide(Some(Position::Short), signal) {
//!     Transition::Reverse { from, to } => println!("{} -> {}", from, to),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod grouper;
pub mod rules;
pub mod transition;
pub mod types;

// Include indicators from parent directory
#[path = "../indicators/mod.rs"]
pub mod indicators_impl;
pub mod indicators {
    pub use super::indicators_impl::*;
}

// Re-export main types
pub use config::EngineConfig;
pub use engine::{BatchReport, SignalEngine, UnitOutcome};
pub use error::{SignalError, SignalResult};
pub use grouper::{group_units, partition_by_key};
pub use indicators::{compute_ema, EmaResult};
pub use rules::SignalRule;
pub use transition::{decide, Transition};
pub use types::{EvaluationUnit, Signal};

/// Initialize tracing subscriber (for examples and tests)
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sg_signals=info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
