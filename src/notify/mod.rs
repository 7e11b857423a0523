//! Notification channels fed by the mutation pipeline.
//!
//! Both channels are best-effort relative to the already-committed write:
//! the [`LiveFeed`] pushes to currently connected subscribers with no
//! delivery guarantee, while the [`EventPublisher`] durably enqueues events
//! for asynchronous consumers and reports failure only at enqueue time.

mod broadcast;
mod publisher;

pub use broadcast::{FeedStats, LiveFeed};
pub use publisher::{EventPublisher, RedisStreamPublisher, DEFAULT_STREAM};
