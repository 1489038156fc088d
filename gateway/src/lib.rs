//! # sg-gateway: Outbound I/O for signalgate
//!
//! Everything that leaves the process goes through this crate: candle
//! requests to the market-data endpoint, human-readable notifications and
//! order messages on the broker's queues.
//!
//! ## Core Components
//!
//! - **CandleSource**: Trait for closing-price history, with a Binance klines implementation
//! - **Notifier**: Bearer-token HTTP notifications, or a log-only fallback
//! - **Publisher**: Durable AMQP queues with publisher confirms, or a log-only fallback
//! - **Dispatcher**: Close/notify/open sequencing for position transitions
//! - **Rate Limiting**: Per-endpoint request budgets
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sg_gateway::market::{BinanceCandleSource, CandleSource};
//! use sg_gateway::{Dispatcher, GatewayConfig};
//! use sg_storage::Position;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::default();
//!
//!     let source = BinanceCandleSource::new(&config.market_data)?;
//!     let series = source.fetch("BTCUSDT", "5m", 30).await?;
//!     println!("last close: {:?}", series.last());
//!
//!     let dispatcher = Dispatcher::from_config(&config)?;
//!     let report = dispatcher
//!         .open_positions("EMA Long/BTCUSDT (5m)", Position::Long, &[])
//!         .await;
//!     println!("notified: {}", report.notified);
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod publish;

// Re-export main types
pub use config::{GatewayConfig, MarketDataConfig, NotifyConfig, QueueConfig};
pub use dispatcher::{DispatchReport, Dispatcher, OrderMessage, QueueNames};
pub use error::{DispatchError, DispatchResult, FetchError, FetchResult};
pub use notify::{HttpNotifier, LogNotifier, Notifier};
pub use publish::{AmqpPublisher, LogPublisher, Publisher};

// Market data
pub mod market {
    pub mod binance;
    pub mod candles;

    pub use binance::BinanceCandleSource;
    pub use candles::{CandleSeries, CandleSource};
}

// Rate limiting
pub mod ratelimit {
    pub mod limiter;

    pub use limiter::{RateLimiter, RateLimiterConfig};
}

/// Initialize tracing subscriber (for examples and tests)
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sg_gateway=info"));

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
