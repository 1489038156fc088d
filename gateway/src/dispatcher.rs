//! Transition-gated emission of notifications and order messages
//!
//! Every send is best effort: failures are collected in the returned
//! [`DispatchReport`] and never undo the position write that preceded them.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use sg_storage::{OrderRef, Position};

use crate::config::GatewayConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::notify::{HttpNotifier, LogNotifier, Notifier};
use crate::publish::{AmqpPublisher, LogPublisher, Publisher};

/// Queue message body: one order per message
#[derive(Debug, Clone, Serialize)]
pub struct OrderMessage<'a> {
    pub position: Position,
    pub order: &'a OrderRef,
}

/// Destination queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub open: String,
    pub close: String,
}

/// Outcome of one dispatch
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Notification delivered
    pub notified: bool,
    /// Messages confirmed by the queue
    pub published: usize,
    /// Failed sends
    pub failures: Vec<DispatchError>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold a later report into this one
    pub fn merge(&mut self, other: DispatchReport) {
        self.notified |= other.notified;
        self.published += other.published;
        self.failures.extend(other.failures);
    }
}

/// Sends notifications and order messages for position transitions
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    publisher: Arc<dyn Publisher>,
    queues: QueueNames,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, publisher: Arc<dyn Publisher>, queues: QueueNames) -> Self {
        Self {
            notifier,
            publisher,
            queues,
        }
    }

    /// Build sinks from configuration
    ///
    /// A missing notify token or broker URL selects the log-only sink.
    pub fn from_config(config: &GatewayConfig) -> DispatchResult<Self> {
        let notifier: Arc<dyn Notifier> = match config.notify.token.as_deref() {
            Some(token) if !token.is_empty() => Arc::new(HttpNotifier::new(&config.notify, token)?),
            _ => {
                info!("No notify token configured, notifications are logged only");
                Arc::new(LogNotifier)
            }
        };

        let publisher: Arc<dyn Publisher> = match config.queue.url.as_deref() {
            Some(url) if !url.is_empty() => Arc::new(AmqpPublisher::new(url, &config.queue)),
            _ => {
                info!("No broker URL configured, queue messages are logged only");
                Arc::new(LogPublisher)
            }
        };

        Ok(Self::new(
            notifier,
            publisher,
            QueueNames {
                open: config.queue.open_queue.clone(),
                close: config.queue.close_queue.clone(),
            },
        ))
    }

    pub fn queues(&self) -> &QueueNames {
        &self.queues
    }

    /// Publish close messages for the position being left
    pub async fn close_positions(&self, old: Position, orders: &[OrderRef]) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.fan_out(&self.queues.close, old, orders, &mut report).await;
        report
    }

    /// Notify, then publish open messages for the new position
    pub async fn open_positions(&self, text: &str, new: Position, orders: &[OrderRef]) -> DispatchReport {
        let mut report = DispatchReport::default();

        match self.notifier.notify(text).await {
            Ok(()) => report.notified = true,
            Err(e) => {
                error!("Notification '{}' failed: {}", text, e);
                report.failures.push(e);
            }
        }

        self.fan_out(&self.queues.open, new, orders, &mut report).await;
        report
    }

    async fn fan_out(&self, queue: &str, position: Position, orders: &[OrderRef], report: &mut DispatchReport) {
        for order in orders {
            let message = OrderMessage { position, order };
            let payload = match serde_json::to_vec(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    report.failures.push(e.into());
                    continue;
                }
            };

            match self.publisher.publish(queue, &payload).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    error!("Order {} to {} failed: {}", order.order_id, queue, e);
                    report.failures.push(e);
                }
            }
        }
    }
}
