//! Binance klines candle source
//!
//! `GET /api/v3/klines?symbol=&interval=&limit=` returns an array of
//! arrays; index 4 of each entry is the close, encoded as a decimal string.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::MarketDataConfig;
use crate::error::{FetchError, FetchResult};
use crate::market::candles::{CandleSeries, CandleSource};
use crate::ratelimit::RateLimiter;

const KLINES_PATH: &str = "api/v3/klines";
const CLOSE_INDEX: usize = 4;

/// Candle source for Binance-compatible REST endpoints
pub struct BinanceCandleSource {
    client: Client,
    klines_url: Url,
    limiter: RateLimiter,
}

impl BinanceCandleSource {
    /// Create a source from configuration
    pub fn new(config: &MarketDataConfig) -> FetchResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;
        let klines_url = base
            .join(KLINES_PATH)
            .map_err(|e| FetchError::InvalidEndpoint(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::InvalidEndpoint(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            klines_url,
            limiter: config.rate_limit().build("binance-klines"),
        })
    }
}

#[async_trait]
impl CandleSource for BinanceCandleSource {
    async fn fetch(&self, symbol: &str, timeframe: &str, limit: usize) -> FetchResult<CandleSeries> {
        if limit == 0 {
            return Err(FetchError::InvalidLimit(limit));
        }

        let mut url = self.klines_url.clone();
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("interval", timeframe)
            .append_pair("limit", &limit.to_string());

        self.limiter.check().await;
        debug!("Fetching {} {} candles for {}", limit, timeframe, symbol);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Unreachable(format!(
                "klines for {} returned HTTP {}: {}",
                symbol, status, body
            )));
        }

        let body = response.bytes().await?;
        let closes = parse_closes(&body)?;

        if closes.len() != limit {
            return Err(FetchError::Incomplete {
                expected: limit,
                actual: closes.len(),
            });
        }

        Ok(CandleSeries::new(closes))
    }
}

/// Extract close prices from a klines payload
pub fn parse_closes(body: &[u8]) -> FetchResult<Vec<f64>> {
    let rows: Vec<Vec<Value>> = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(format!("expected array of klines: {}", e)))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let raw = row.get(CLOSE_INDEX).ok_or_else(|| {
                FetchError::MalformedResponse(format!("kline {} has {} fields", i, row.len()))
            })?;

            let close = match raw {
                Value::String(s) => s.parse::<f64>().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            };

            close.filter(|c| c.is_finite()).ok_or_else(|| {
                FetchError::MalformedResponse(format!("kline {} close is not a number: {}", i, raw))
            })
        })
        .collect()
}
