//! Signal rules: how many candles each needs and how it reads them

use serde::{Deserialize, Serialize};
use std::fmt;

use sg_storage::RuleType;

use crate::error::{SignalError, SignalResult};
use crate::indicators::compute_ema;
use crate::types::Signal;

/// Fast EMA period of the CDC rule
pub const CDC_FAST_PERIOD: usize = 12;
/// Slow EMA period of the CDC rule
pub const CDC_SLOW_PERIOD: usize = 26;
/// Candles fetched for the CDC rule
pub const CDC_LOOKBACK: usize = 52;

/// Rule family with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SignalRule {
    /// Price against a single EMA
    Ema { period: u32 },
    /// 12/26 EMA crossover
    Cdc,
}

impl SignalRule {
    /// Build a rule from catalog fields
    ///
    /// EMA needs a positive period; CDC ignores any period given.
    pub fn from_parts(rule_type: RuleType, ema_period: Option<u32>) -> SignalResult<Self> {
        match (rule_type, ema_period) {
            (RuleType::Ema, Some(period)) if period > 0 => Ok(SignalRule::Ema { period }),
            (RuleType::Ema, other) => Err(SignalError::InvalidParameter(format!(
                "EMA rule needs a positive period, got {:?}",
                other
            ))),
            (RuleType::Cdc, _) => Ok(SignalRule::Cdc),
        }
    }

    pub fn rule_type(&self) -> RuleType {
        match self {
            SignalRule::Ema { .. } => RuleType::Ema,
            SignalRule::Cdc => RuleType::Cdc,
        }
    }

    /// EMA period stored with the position record and used to select orders
    pub fn ema_period(&self) -> Option<u32> {
        match self {
            SignalRule::Ema { period } => Some(*period),
            SignalRule::Cdc => None,
        }
    }

    /// Candles to request per evaluation
    pub fn lookback(&self) -> usize {
        match self {
            SignalRule::Ema { period } => 2 * *period as usize,
            SignalRule::Cdc => CDC_LOOKBACK,
        }
    }

    /// Classify a closing-price window (oldest first)
    pub fn classify(&self, closes: &[f64]) -> SignalResult<Signal> {
        match self {
            SignalRule::Ema { period } => classify_ema(closes, *period as usize),
            SignalRule::Cdc => classify_cdc(closes),
        }
    }
}

impl fmt::Display for SignalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalRule::Ema { period } => write!(f, "EMA({})", period),
            SignalRule::Cdc => write!(f, "CDC"),
        }
    }
}

// The most recent close is excluded: the EMA and the price it is compared
// against both end on the second-to-last candle.
fn classify_ema(closes: &[f64], period: usize) -> SignalResult<Signal> {
    let (_, settled) = closes.split_last().ok_or(SignalError::InsufficientData {
        needed: period + 1,
        available: 0,
    })?;
    let prev = compute_ema(settled, period)?;

    Ok(if prev.ema > prev.last_price {
        Signal::Short
    } else if prev.last_price > prev.ema {
        Signal::Long
    } else {
        Signal::Neutral
    })
}

fn classify_cdc(closes: &[f64]) -> SignalResult<Signal> {
    let fast = compute_ema(closes, CDC_FAST_PERIOD)?;
    let slow = compute_ema(closes, CDC_SLOW_PERIOD)?;

    Ok(if slow.ema > fast.ema {
        Signal::Long
    } else if fast.ema > slow.ema {
        Signal::Short
    } else {
        Signal::Neutral
    })
}
