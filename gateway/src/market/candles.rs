//! Candle source contract

use async_trait::async_trait;

use crate::error::FetchResult;

/// Closing prices for one symbol and timeframe, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    closes: Vec<f64>,
}

impl CandleSeries {
    pub fn new(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Most recent close
    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

impl From<Vec<f64>> for CandleSeries {
    fn from(closes: Vec<f64>) -> Self {
        Self::new(closes)
    }
}

/// Source of historical closing prices
///
/// One call is one outbound request. Implementations do not cache or retry;
/// the next scheduler tick is the retry.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch exactly `limit` closes for `symbol` on `timeframe`
    ///
    /// # Returns
    /// * `Ok(series)` - `series.len() == limit`
    /// * `Err(FetchError::InvalidLimit)` - `limit == 0`, no request made
    /// * `Err(FetchError::Incomplete)` - Endpoint returned a different count
    async fn fetch(&self, symbol: &str, timeframe: &str, limit: usize) -> FetchResult<CandleSeries>;
}
