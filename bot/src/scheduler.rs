use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sg_signals::SignalEngine;

use crate::timeframe::Timeframe;

/// Runs one batch per candle close of a timeframe
pub struct TimeframeScheduler {
    engine: Arc<SignalEngine>,
    timeframe: Timeframe,
    settle_delay: Duration,
}

impl TimeframeScheduler {
    pub fn new(engine: Arc<SignalEngine>, timeframe: Timeframe, settle_delay: Duration) -> Self {
        Self {
            engine,
            timeframe,
            settle_delay,
        }
    }

    /// Run until cancelled
    ///
    /// Batches for this timeframe run back to back, never overlapping; a
    /// batch that overruns a boundary skips the ticks it missed.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Starting scheduler for {} (every {:?}, settle {:?})",
            self.timeframe,
            self.timeframe.period(),
            self.settle_delay
        );

        loop {
            let now = Utc::now();
            let fire_at = next_fire(now, &self.timeframe, self.settle_delay);
            let wait = (fire_at - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let report = self.engine.run_batch(self.timeframe.label(), &cancel).await;
            if report.cancelled {
                break;
            }
            if report.failed > 0 || report.dispatch_failures > 0 {
                error!(
                    "{} batch finished with {} failed units and {} dispatch failures",
                    self.timeframe, report.failed, report.dispatch_failures
                );
            }
        }

        info!("Scheduler for {} stopped", self.timeframe);
    }
}

/// First candle boundary plus settle delay strictly after `now`
pub fn next_fire(now: DateTime<Utc>, timeframe: &Timeframe, settle_delay: Duration) -> DateTime<Utc> {
    let period = timeframe.period().as_millis() as i64;
    let anchor = timeframe.anchor().as_millis() as i64;
    let settle = settle_delay.as_millis() as i64;

    let since_anchor = now.timestamp_millis() - settle - anchor;
    let boundary = since_anchor.div_euclid(period) * period + period + anchor;

    now + ChronoDuration::milliseconds(boundary + settle - now.timestamp_millis())
}
