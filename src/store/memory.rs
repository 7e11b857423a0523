//! In-memory resource store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{ErrorCode, ResmanError, Result};
use crate::model::{Actor, Resource, ResourceChanges, RevisionToken};
use crate::store::ResourceStore;

/// Dashmap-backed store with the same compare-and-swap semantics as the
/// Postgres backend: the token comparison and the write happen under the
/// entry's shard lock, so racing updates against the same identifier are
/// serialized and at most one with a given observed token can win.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<Uuid, Resource>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Resource>> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_all(&self) -> Result<Vec<Resource>> {
        let mut resources: Vec<Resource> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn insert(&self, resource: &Resource) -> Result<()> {
        match self.records.entry(resource.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ResmanError::new(
                ErrorCode::DuplicateRecord,
                format!("Resource already exists: {}", resource.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(resource.clone());
                Ok(())
            }
        }
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        changes: &ResourceChanges,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Resource> {
        match self.records.get_mut(&id) {
            None => Err(ResmanError::not_found(id)),
            Some(mut entry) => {
                if entry.version != changes.expected_version {
                    return Err(ResmanError::version_conflict(id));
                }

                entry.name = changes.name.clone();
                entry.description = changes.description.clone();
                entry.location = changes.location.clone();
                entry.category = changes.category;
                entry.last_updated_at = now;
                entry.last_updated_by = Some(actor.id);
                entry.version = RevisionToken::fresh();

                Ok(entry.clone())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Resource> {
        match self.records.remove(&id) {
            Some((_, resource)) => Ok(resource),
            None => Err(ResmanError::not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActorRole, ResourceCategory, ResourceDraft};

    fn member() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Member,
        }
    }

    fn draft(name: &str) -> ResourceDraft {
        ResourceDraft {
            name: name.into(),
            description: None,
            location: None,
            category: ResourceCategory::Hardware,
        }
    }

    fn changes_from(resource: &Resource, name: &str) -> ResourceChanges {
        ResourceChanges {
            name: name.into(),
            description: resource.description.clone(),
            location: resource.location.clone(),
            category: resource.category,
            expected_version: resource.version,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let resource = Resource::from_draft(draft("Monitor"), &member(), Utc::now());

        store.insert(&resource).await.unwrap();
        let fetched = store.get(resource.id).await.unwrap().unwrap();
        assert_eq!(fetched, resource);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let store = MemoryStore::new();
        let resource = Resource::from_draft(draft("Monitor"), &member(), Utc::now());

        store.insert(&resource).await.unwrap();
        let err = store.insert(&resource).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_conditional_update_advances_version() {
        let store = MemoryStore::new();
        let actor = member();
        let resource = Resource::from_draft(draft("Monitor"), &actor, Utc::now());
        store.insert(&resource).await.unwrap();

        let updated = store
            .conditional_update(
                resource.id,
                &changes_from(&resource, "Monitor v2"),
                &actor,
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Monitor v2");
        assert_ne!(updated.version, resource.version);
        assert_eq!(updated.created_at, resource.created_at);
    }

    #[tokio::test]
    async fn test_conditional_update_with_stale_token_conflicts() {
        let store = MemoryStore::new();
        let actor = member();
        let resource = Resource::from_draft(draft("Monitor"), &actor, Utc::now());
        store.insert(&resource).await.unwrap();

        // First writer wins.
        store
            .conditional_update(
                resource.id,
                &changes_from(&resource, "Monitor v2"),
                &actor,
                Utc::now(),
            )
            .await
            .unwrap();

        // Second writer still carries the original token.
        let err = store
            .conditional_update(
                resource.id,
                &changes_from(&resource, "Monitor v3"),
                &actor,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn test_delete_then_update_is_not_found() {
        let store = MemoryStore::new();
        let actor = member();
        let resource = Resource::from_draft(draft("Monitor"), &actor, Utc::now());
        store.insert(&resource).await.unwrap();

        store.delete(resource.id).await.unwrap();

        let err = store
            .conditional_update(
                resource.id,
                &changes_from(&resource, "Monitor v2"),
                &actor,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_get_all_is_ordered_by_name() {
        let store = MemoryStore::new();
        let actor = member();
        for name in ["Zebra printer", "Access point", "Monitor"] {
            store
                .insert(&Resource::from_draft(draft(name), &actor, Utc::now()))
                .await
                .unwrap();
        }

        let all = store.get_all().await.unwrap();
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Access point", "Monitor", "Zebra printer"]);
    }
}
