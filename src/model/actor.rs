//! Actor references supplied by the authentication collaborator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Ordinary actor: may create and update resources.
    Member,
    /// Privileged actor: may additionally delete resources.
    Admin,
}

/// An already-authenticated caller identity.
///
/// Produced by the API edge from a verified bearer token; the mutation
/// pipeline consumes it as a plain value and never re-verifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
