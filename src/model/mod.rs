//! Domain model: the versioned resource entity, actors, mutation intents,
//! and the outbound event projection emitted after successful mutations.

mod actor;
mod event;
mod resource;

pub use actor::{Actor, ActorRole};
pub use event::{ResourceEvent, DELETED_EVENT, CREATED_EVENT, UPDATED_EVENT};
pub use resource::{
    Resource, ResourceCategory, ResourceChanges, ResourceDraft, RevisionToken,
    MAX_DESCRIPTION_LEN, MAX_LOCATION_LEN, MAX_NAME_LEN,
};
