//! Fan-out of resource events to live subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::ResourceEvent;

/// Statistics about the live feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedStats {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_dropped: u64,
    pub active_subscribers: u64,
}

/// Best-effort broadcast channel delivering every event to all current
/// subscribers.
///
/// Backed by `tokio::sync::broadcast`: sending never blocks beyond channel
/// buffering, slow subscribers observe lag rather than stalling the sender,
/// and an empty subscriber set is not an error. The pipeline holds one
/// `LiveFeed` for the lifetime of the service.
pub struct LiveFeed {
    channel: broadcast::Sender<ResourceEvent>,
    total_sent: AtomicU64,
    total_delivered: AtomicU64,
    total_dropped: AtomicU64,
}

impl LiveFeed {
    /// Create a feed with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            channel: tx,
            total_sent: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.channel.subscribe()
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Failures are swallowed: with no subscribers the event is simply
    /// dropped, which is the contract for this channel.
    pub fn send_to_all(&self, event: &ResourceEvent) {
        self.total_sent.fetch_add(1, Ordering::Relaxed);

        match self.channel.send(event.clone()) {
            Ok(subscriber_count) => {
                self.total_delivered
                    .fetch_add(subscriber_count as u64, Ordering::Relaxed);
                debug!(
                    event = event.event_name(),
                    resource_id = %event.resource_id(),
                    subscribers = subscriber_count,
                    "Live event sent"
                );
            }
            Err(_) => {
                // No subscribers connected.
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event = event.event_name(),
                    resource_id = %event.resource_id(),
                    "No live subscribers for event"
                );
            }
        }
    }

    /// Get feed statistics.
    pub fn stats(&self) -> FeedStats {
        FeedStats {
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            active_subscribers: self.channel.receiver_count() as u64,
        }
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn deleted_event() -> ResourceEvent {
        ResourceEvent::Deleted {
            resource_id: Uuid::new_v4(),
            name: "Scanner".into(),
            deleted_by: Uuid::new_v4(),
            deleted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let feed = LiveFeed::new(16);
        let mut rx = feed.subscribe();

        let event = deleted_event();
        feed.send_to_all(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.resource_id(), event.resource_id());

        let stats = feed.stats();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(stats.total_delivered, 1);
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_dropped_silently() {
        let feed = LiveFeed::new(16);
        feed.send_to_all(&deleted_event());

        let stats = feed.stats();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(stats.total_dropped, 1);
        assert_eq!(stats.active_subscribers, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let feed = LiveFeed::new(16);
        let mut rx_a = feed.subscribe();
        let mut rx_b = feed.subscribe();

        feed.send_to_all(&deleted_event());
        feed.send_to_all(&deleted_event());

        for rx in [&mut rx_a, &mut rx_b] {
            rx.recv().await.unwrap();
            rx.recv().await.unwrap();
        }
        assert_eq!(feed.stats().total_delivered, 4);
    }
}
