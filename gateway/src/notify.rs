//! Human-readable notifications

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::config::NotifyConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::ratelimit::RateLimiter;

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    async fn notify(&self, text: &str) -> DispatchResult<()>;
}

/// Notifier posting a `message` form field with a bearer token
///
/// Compatible with LINE Notify.
pub struct HttpNotifier {
    client: Client,
    endpoint: Url,
    token: String,
    limiter: RateLimiter,
}

impl HttpNotifier {
    pub fn new(config: &NotifyConfig, token: impl Into<String>) -> DispatchResult<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| DispatchError::ConfigError(format!("notify endpoint {}: {}", config.endpoint, e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DispatchError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token: token.into(),
            limiter: config.rate_limit().build("notify"),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, text: &str) -> DispatchResult<()> {
        self.limiter.check().await;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .form(&[("message", text)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(format!("notify: {}", e))
                } else {
                    DispatchError::NotifyFailed {
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DispatchError::NotifyFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(())
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> DispatchResult<()> {
        info!("Notification (no sink configured): {}", text);
        Ok(())
    }
}
