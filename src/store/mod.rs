//! Durable resource storage.
//!
//! The store is the only shared mutable state in the service and the sole
//! arbiter of write conflicts: `conditional_update` compares the caller's
//! revision token with the stored one atomically with the write. The
//! pipeline performs no locking of its own on top of this.
//!
//! Two backends are provided:
//! - [`PgStore`]: PostgreSQL via sqlx, the production backend
//! - [`MemoryStore`]: dashmap-backed, for tests and local development

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Actor, Resource, ResourceChanges};

/// Transactional storage for resource records, keyed by identifier.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a single resource, or `None` if the identifier is absent.
    async fn get(&self, id: Uuid) -> Result<Option<Resource>>;

    /// Fetch the full current set, ordered by name.
    async fn get_all(&self) -> Result<Vec<Resource>>;

    /// Insert a freshly created resource.
    ///
    /// Fails with `DuplicateRecord` if the identifier already exists and
    /// with `DatabaseError` on other storage failures.
    async fn insert(&self, resource: &Resource) -> Result<()>;

    /// Conditionally apply an update.
    ///
    /// Atomically compares `changes.expected_version` against the stored
    /// token; on match writes the mutable fields, stamps the audit columns
    /// with `actor` and `now`, generates a fresh token, and returns the
    /// stored row. Exactly one of any set of racing updates carrying the
    /// same observed token can succeed.
    ///
    /// Errors: `RecordNotFound` if the identifier is absent,
    /// `VersionConflict` if the token is stale, `DatabaseError` otherwise.
    async fn conditional_update(
        &self,
        id: Uuid,
        changes: &ResourceChanges,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Resource>;

    /// Physically remove a resource, returning its final state.
    ///
    /// Deletion is irreversible; identifiers are never reused. Errors:
    /// `RecordNotFound` if absent, `DatabaseError` otherwise.
    async fn delete(&self, id: Uuid) -> Result<Resource>;
}
