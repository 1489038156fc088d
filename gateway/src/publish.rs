//! Order messages onto durable AMQP queues

use async_trait::async_trait;
use chrono::Utc;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{DispatchError, DispatchResult};

const PERSISTENT: u8 = 2;

/// Outbound message queue
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one JSON payload to `queue`
    async fn publish(&self, queue: &str, payload: &[u8]) -> DispatchResult<()>;
}

struct Session {
    // Held so the connection outlives the channel
    _connection: Connection,
    channel: Channel,
    declared: HashSet<String>,
}

/// Publisher for an AMQP 0-9-1 broker
///
/// The connection is opened on first use and reopened after any failure.
/// Queues are declared durable, messages are persistent and every publish
/// waits for the broker's confirmation.
pub struct AmqpPublisher {
    url: String,
    timeout: Duration,
    session: Mutex<Option<Session>>,
}

impl AmqpPublisher {
    pub fn new(url: impl Into<String>, config: &QueueConfig) -> Self {
        Self {
            url: url.into(),
            timeout: config.timeout(),
            session: Mutex::new(None),
        }
    }

    async fn bounded<T, F>(&self, queue: &str, what: &str, fut: F) -> DispatchResult<T>
    where
        F: Future<Output = Result<T, lapin::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DispatchError::PublishFailed {
                queue: queue.to_string(),
                message: format!("{}: {}", what, e),
            }),
            Err(_) => Err(DispatchError::Timeout(format!(
                "{} on {} after {:?}",
                what, queue, self.timeout
            ))),
        }
    }

    async fn open_session(&self, queue: &str) -> DispatchResult<Session> {
        info!("Connecting to message broker");

        let connection = self
            .bounded(queue, "connect", Connection::connect(&self.url, ConnectionProperties::default()))
            .await?;
        let channel = self.bounded(queue, "create channel", connection.create_channel()).await?;
        self.bounded(
            queue,
            "enable confirms",
            channel.confirm_select(ConfirmSelectOptions::default()),
        )
        .await?;

        Ok(Session {
            _connection: connection,
            channel,
            declared: HashSet::new(),
        })
    }

    async fn publish_on(&self, session: &mut Session, queue: &str, payload: &[u8]) -> DispatchResult<()> {
        if !session.declared.contains(queue) {
            self.bounded(
                queue,
                "declare queue",
                session.channel.queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                ),
            )
            .await?;
            session.declared.insert(queue.to_string());
        }

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT)
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_timestamp(Utc::now().timestamp().max(0) as u64);

        let confirm = self
            .bounded(
                queue,
                "publish",
                session.channel.basic_publish(
                    "",
                    queue,
                    BasicPublishOptions::default(),
                    payload,
                    properties,
                ),
            )
            .await?;

        match self.bounded(queue, "confirm", confirm).await? {
            Confirmation::Nack(_) => Err(DispatchError::PublishFailed {
                queue: queue.to_string(),
                message: "broker nacked the message".to_string(),
            }),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, queue: &str, payload: &[u8]) -> DispatchResult<()> {
        let mut guard = self.session.lock().await;

        if let Some(session) = guard.as_ref() {
            if !session.channel.status().connected() {
                warn!("Broker channel closed, reconnecting");
                *guard = None;
            }
        }

        let mut session = match guard.take() {
            Some(session) => session,
            None => self.open_session(queue).await?,
        };

        let result = self.publish_on(&mut session, queue, payload).await;
        if result.is_ok() {
            debug!("Published {} bytes to {}", payload.len(), queue);
            *guard = Some(session);
        }
        result
    }
}

/// Publisher that only writes to the log
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, queue: &str, payload: &[u8]) -> DispatchResult<()> {
        info!(
            "Queue message (no broker configured) {}: {}",
            queue,
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }
}
