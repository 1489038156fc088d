//! Exponential moving average over a closing-price window

use crate::error::{SignalError, SignalResult};

/// EMA at the end of a series, with the price it ended on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaResult {
    pub ema: f64,
    pub last_price: f64,
}

/// Compute the EMA of `series` (oldest first) for `period`
///
/// The seed is the simple mean of the first `period` points; every later
/// point folds in with smoothing `2 / (period + 1)`.
///
/// # Returns
/// * `Err(SignalError::InvalidParameter)` - `period == 0`
/// * `Err(SignalError::InsufficientData)` - Fewer than `period` points
pub fn compute_ema(series: &[f64], period: usize) -> SignalResult<EmaResult> {
    if period == 0 {
        return Err(SignalError::InvalidParameter("EMA period must be at least 1".to_string()));
    }
    if series.len() < period {
        return Err(SignalError::InsufficientData {
            needed: period,
            available: series.len(),
        });
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = series[..period].iter().sum::<f64>() / period as f64;
    let ema = series[period..]
        .iter()
        .fold(seed, |ema, price| (price - ema) * k + ema);

    Ok(EmaResult {
        ema,
        last_price: series[series.len() - 1],
    })
}
