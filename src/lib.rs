//! # Resman Core
//!
//! A shared resource inventory with dual-channel change notification.
//!
//! ## Architecture
//!
//! - **Model**: version-stamped resource entities; every revision carries an
//!   opaque token used for compare-and-swap conflict detection
//! - **Store**: transactional storage (PostgreSQL, plus an in-memory backend
//!   for tests) and the sole arbiter of write conflicts
//! - **Pipeline**: validates mutation intents, applies them with
//!   optimistic-concurrency protection, and fans successful mutations out to
//!   both notification channels
//! - **Notify**: best-effort live broadcast to connected viewers and durable
//!   at-least-once event publishing over a redis stream
//! - **API**: axum HTTP surface with bearer-token actor resolution and a
//!   WebSocket endpoint for live viewers

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod telemetry;

pub use error::{ErrorCode, ResmanError, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::{ErrorCode, ResmanError, Result};
    pub use crate::model::{
        Actor, ActorRole, Resource, ResourceCategory, ResourceChanges, ResourceDraft,
        ResourceEvent, RevisionToken,
    };
    pub use crate::notify::{EventPublisher, LiveFeed, RedisStreamPublisher};
    pub use crate::pipeline::MutationPipeline;
    pub use crate::store::{MemoryStore, PgStore, ResourceStore};
}
