//! Operational notifications ("booking confirmed", "new signup", ...).
//!
//! Delivery is best effort. The ledger dispatches through [`dispatch`], which
//! runs the publish on a spawned task and only logs failures.

use ::redis::{aio::MultiplexedConnection, AsyncCommands};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("publish failed: {0}")]
    Publish(#[from] ::redis::RedisError),
    #[error("could not encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError>;
}

/// Wire format published on the Redis channel.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    subject: &'a str,
    message: &'a str,
    sent_at: DateTime<Utc>,
}

/// Publishes a JSON envelope on a Redis pub/sub channel.
#[derive(Clone)]
pub struct RedisNotifier {
    conn: MultiplexedConnection,
    channel: String,
}

impl RedisNotifier {
    pub fn new(conn: MultiplexedConnection, channel: impl Into<String>) -> Self {
        Self { conn, channel: channel.into() }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&Envelope {
            subject,
            message,
            sent_at: Utc::now(),
        })?;
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(&self.channel, payload).await?;
        Ok(())
    }
}

/// Writes notifications to the log instead of an external channel.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        info!(subject, "notification: {}", message);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn publish(&self, _subject: &str, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Fire-and-forget: never blocks the caller and never surfaces an error.
pub fn dispatch(notifier: &Arc<dyn Notifier>, subject: impl Into<String>, message: impl Into<String>) {
    let notifier = Arc::clone(notifier);
    let subject = subject.into();
    let message = message.into();
    tokio::spawn(async move {
        if let Err(e) = notifier.publish(&subject, &message).await {
            warn!("Notification '{}' dropped: {}", subject, e);
        }
    });
}
