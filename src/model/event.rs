//! Outbound events handed to both notification channels.
//!
//! One event is produced per successful mutation and is never stored by the
//! core. For deletions only an identifier-plus-audit tombstone is emitted;
//! downstream consumers must treat it as the last authoritative signal for
//! that identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Resource;

/// Event-kind name for creations, as seen by live subscribers.
pub const CREATED_EVENT: &str = "resource-created";
/// Event-kind name for updates.
pub const UPDATED_EVENT: &str = "resource-updated";
/// Event-kind name for deletions.
pub const DELETED_EVENT: &str = "resource-deleted";

/// A transient projection of a successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceEvent {
    #[serde(rename = "resource-created")]
    Created { resource: Resource },
    #[serde(rename = "resource-updated")]
    Updated { resource: Resource },
    #[serde(rename = "resource-deleted")]
    Deleted {
        resource_id: Uuid,
        name: String,
        deleted_by: Uuid,
        deleted_at: DateTime<Utc>,
    },
}

impl ResourceEvent {
    /// The event-kind name used for live-subscriber tagging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Created { .. } => CREATED_EVENT,
            Self::Updated { .. } => UPDATED_EVENT,
            Self::Deleted { .. } => DELETED_EVENT,
        }
    }

    /// Routing key for the durable publisher.
    ///
    /// Update and delete keys carry the resource identifier as a suffix so
    /// that downstream consumers can filter on a single resource.
    pub fn routing_key(&self) -> String {
        match self {
            Self::Created { .. } => "resource.created".to_string(),
            Self::Updated { resource } => format!("resource.updated.{}", resource.id),
            Self::Deleted { resource_id, .. } => format!("resource.deleted.{}", resource_id),
        }
    }

    /// The identifier of the resource this event concerns.
    pub fn resource_id(&self) -> Uuid {
        match self {
            Self::Created { resource } | Self::Updated { resource } => resource.id,
            Self::Deleted { resource_id, .. } => *resource_id,
        }
    }
}
