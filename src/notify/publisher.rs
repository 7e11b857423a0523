//! Durable event publishing for asynchronous consumers.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::debug;

use crate::error::Result;
use crate::model::ResourceEvent;

/// Default stream all resource events are appended to.
pub const DEFAULT_STREAM: &str = "resource.events";

/// At-least-once publisher of resource events.
///
/// Once `publish` returns `Ok`, the event has been durably enqueued and
/// survives a restart of this process. Per-resource ordering follows append
/// order on the underlying stream. Failures are reported only at enqueue
/// time; redelivery to consumers is the broker's concern, not the
/// pipeline's.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Durably enqueue one event under the given routing key.
    async fn publish(&self, routing_key: &str, event: &ResourceEvent) -> Result<()>;
}

/// Publisher backed by a redis stream.
///
/// Events are appended with `XADD` carrying the routing key and the JSON
/// payload as fields; consumer groups on the stream provide at-least-once
/// redelivery. The connection manager reconnects on its own, so the handle
/// is created once at service start and shared for the process lifetime.
pub struct RedisStreamPublisher {
    connection: ConnectionManager,
    stream: String,
}

impl RedisStreamPublisher {
    /// Connect to redis and prepare a publisher for the given stream.
    pub async fn connect(redis_url: &str, stream: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            stream: stream.into(),
        })
    }

    /// The stream events are appended to.
    pub fn stream(&self) -> &str {
        &self.stream
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(&self, routing_key: &str, event: &ResourceEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;

        let mut connection = self.connection.clone();
        let entry_id: String = connection
            .xadd(
                &self.stream,
                "*",
                &[("routing_key", routing_key), ("payload", payload.as_str())],
            )
            .await?;

        debug!(
            stream = %self.stream,
            routing_key = routing_key,
            entry_id = %entry_id,
            "Event published"
        );

        Ok(())
    }
}
