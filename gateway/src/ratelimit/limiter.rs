//! Token-bucket rate limiting for outbound HTTP endpoints
//!
//! Exchange and notification APIs ban clients that exceed their request
//! budgets, so every outbound call waits on the limiter for its endpoint.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Rate limiter for one endpoint
pub struct RateLimiter {
    endpoint: String,
    limiter: DefaultDirectRateLimiter,
    requests_per_second: u32,
    burst_size: u32,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `endpoint` - Name used in logs
    /// * `requests_per_second` - Maximum sustained requests per second (zero is treated as one)
    /// * `burst_size` - Maximum burst capacity (zero is treated as one)
    pub fn new(endpoint: impl Into<String>, requests_per_second: u32, burst_size: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(burst_size).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            endpoint: endpoint.into(),
            limiter: GovRateLimiter::direct(quota),
            requests_per_second: rate.get(),
            burst_size: burst.get(),
        }
    }

    /// Wait until the rate limit allows one more request
    pub async fn check(&self) {
        if self.limiter.check().is_err() {
            tracing::debug!("Rate limit reached for {}, waiting", self.endpoint);
            self.limiter.until_ready().await;
        }
    }

    /// Get endpoint name
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get requests per second limit
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    /// Get burst size
    pub fn burst_size(&self) -> u32 {
        self.burst_size
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_size: u32,
}

impl RateLimiterConfig {
    /// Create a new rate limiter configuration
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Default budget for Binance public market data
    pub fn binance_default() -> Self {
        Self {
            requests_per_second: 20,
            burst_size: 50,
        }
    }

    /// Default budget for the notification endpoint
    pub fn notify_default() -> Self {
        Self {
            requests_per_second: 1,
            burst_size: 5,
        }
    }

    /// Build a rate limiter with this configuration
    pub fn build(&self, endpoint: impl Into<String>) -> RateLimiter {
        RateLimiter::new(endpoint, self.requests_per_second, self.burst_size)
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::binance_default()
    }
}
