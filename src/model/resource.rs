//! The resource entity and its mutation intents.
//!
//! Every persisted revision of a resource carries an opaque [`RevisionToken`].
//! The token is regenerated by the store on every successful write and is the
//! sole defense against lost updates: an update intent must present the token
//! its caller last observed, and the store's conditional write succeeds only
//! when that token still matches the stored one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ResmanError, Result};
use crate::model::Actor;

/// Maximum length of a resource name.
pub const MAX_NAME_LEN: usize = 120;
/// Maximum length of a resource description.
pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Maximum length of a resource location.
pub const MAX_LOCATION_LEN: usize = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// Revision Token
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque per-revision token used for compare-and-swap conflict detection.
///
/// Tokens are compared only for equality, never ordered or interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionToken(pub Uuid);

impl RevisionToken {
    /// Generate a fresh token, distinct from every previously issued one.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Category
// ═══════════════════════════════════════════════════════════════════════════════

/// Closed classification of resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Hardware,
    Software,
    Document,
    Other,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    /// Parse a stored category string back into the enum.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "hardware" => Ok(Self::Hardware),
            "software" => Ok(Self::Software),
            "document" => Ok(Self::Document),
            "other" => Ok(Self::Other),
            _ => Err(ResmanError::internal(format!(
                "Unknown resource category in storage: {}",
                s
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entity
// ═══════════════════════════════════════════════════════════════════════════════

/// A mutable inventory record.
///
/// Invariants:
/// - `id`, `created_at`, and `created_by` never change after creation.
/// - `version` differs from every previously observed value after each
///   successful write.
/// - `last_updated_at` is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: ResourceCategory,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub last_updated_by: Option<Uuid>,
    pub version: RevisionToken,
}

impl Resource {
    /// Construct a new resource from a validated draft.
    ///
    /// `created_at` and `last_updated_at` start equal; both audit fields are
    /// stamped with the creating actor.
    pub fn from_draft(draft: ResourceDraft, actor: &Actor, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            location: draft.location,
            category: draft.category,
            created_at: now,
            last_updated_at: now,
            created_by: Some(actor.id),
            last_updated_by: Some(actor.id),
            version: RevisionToken::fresh(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Mutation Intents
// ═══════════════════════════════════════════════════════════════════════════════

/// Intent to create a new resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub category: ResourceCategory,
}

impl ResourceDraft {
    /// Reject malformed drafts before they reach the store.
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, self.description.as_deref(), self.location.as_deref())
    }
}

/// Intent to update an existing resource.
///
/// Carries the revision token the caller last observed; the store validates
/// it atomically with the write, so a stale caller always gets a conflict
/// instead of silently overwriting a concurrent change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChanges {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub category: ResourceCategory,
    pub expected_version: RevisionToken,
}

impl ResourceChanges {
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, self.description.as_deref(), self.location.as_deref())
    }
}

fn validate_fields(name: &str, description: Option<&str>, location: Option<&str>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ResmanError::validation("Resource name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ResmanError::validation(format!(
            "Resource name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    if let Some(description) = description {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(ResmanError::validation(format!(
                "Resource description exceeds {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    if let Some(location) = location {
        if location.len() > MAX_LOCATION_LEN {
            return Err(ResmanError::validation(format!(
                "Resource location exceeds {} characters",
                MAX_LOCATION_LEN
            )));
        }
    }
    Ok(())
}
