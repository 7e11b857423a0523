//! The resource mutation pipeline.
//!
//! Orchestrates every mutation: validate the intent, apply it to the store
//! with optimistic-concurrency protection, then fan the result out to the
//! live feed and the durable publisher. The store is the sole arbiter of
//! conflicts; the pipeline holds no locks and is safe to invoke from any
//! number of concurrent request handlers.
//!
//! Failure policy: persistence success is the operation's success criterion.
//! Emission runs in a detached task after the write has committed; a failed
//! emission is logged and counted but never rolls back the write and never
//! changes the outcome the caller sees. Retrying the persisted write because
//! a notification failed would risk duplicate user-visible mutations, so
//! notification loss is accepted and left to the broker's own redelivery
//! mechanics.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Actor, Resource, ResourceChanges, ResourceDraft, ResourceEvent};
use crate::notify::{EventPublisher, LiveFeed};
use crate::store::ResourceStore;

/// The mutation and dual-channel notification pipeline.
///
/// Holds its collaborator handles for the lifetime of the service; they are
/// injected once at construction and never reconstructed per call.
#[derive(Clone)]
pub struct MutationPipeline {
    store: Arc<dyn ResourceStore>,
    live_feed: Arc<LiveFeed>,
    publisher: Arc<dyn EventPublisher>,
}

impl MutationPipeline {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        live_feed: Arc<LiveFeed>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            live_feed,
            publisher,
        }
    }

    /// The live feed, for wiring subscriber transports.
    pub fn live_feed(&self) -> &Arc<LiveFeed> {
        &self.live_feed
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reads (pure, no emission)
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch a single resource.
    pub async fn get(&self, id: Uuid) -> Result<Resource> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| crate::error::ResmanError::not_found(id))
    }

    /// Fetch all resources, ordered by name.
    pub async fn list(&self) -> Result<Vec<Resource>> {
        self.store.get_all().await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutations
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a new resource.
    ///
    /// Persists unconditionally (there is no prior revision to check). On
    /// persistence failure the error is returned and nothing is emitted; on
    /// success the created entity is returned regardless of emission outcome.
    #[instrument(skip(self, draft), fields(actor = %actor.id))]
    pub async fn create(&self, draft: ResourceDraft, actor: Actor) -> Result<Resource> {
        draft.validate()?;

        let resource = Resource::from_draft(draft, &actor, Utc::now());
        self.store.insert(&resource).await?;

        debug!(resource_id = %resource.id, "Resource created");
        self.emit(ResourceEvent::Created {
            resource: resource.clone(),
        });

        Ok(resource)
    }

    /// Update an existing resource.
    ///
    /// The intent carries the revision token the caller last observed; the
    /// store compares it atomically with the write. A stale caller gets a
    /// `VersionConflict` and must refresh and retry, never a silent
    /// overwrite. The losing side of a race is never emitted.
    #[instrument(skip(self, changes), fields(actor = %actor.id))]
    pub async fn update(&self, id: Uuid, changes: ResourceChanges, actor: Actor) -> Result<Resource> {
        changes.validate()?;

        let resource = self
            .store
            .conditional_update(id, &changes, &actor, Utc::now())
            .await?;

        debug!(resource_id = %resource.id, version = %resource.version, "Resource updated");
        self.emit(ResourceEvent::Updated {
            resource: resource.clone(),
        });

        Ok(resource)
    }

    /// Delete a resource.
    ///
    /// Precondition: the calling layer has verified the actor holds the
    /// admin role; the pipeline itself is role-agnostic. Deletion is
    /// physical and terminal for the identifier; the emitted tombstone is
    /// the last authoritative signal downstream consumers will see for it.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn delete(&self, id: Uuid, actor: Actor) -> Result<()> {
        let resource = self.store.delete(id).await?;

        debug!(resource_id = %id, "Resource deleted");
        self.emit(ResourceEvent::Deleted {
            resource_id: resource.id,
            name: resource.name,
            deleted_by: actor.id,
            deleted_at: Utc::now(),
        });

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Emission
    // ═══════════════════════════════════════════════════════════════════════

    /// Fan one event out to both channels in a detached task.
    ///
    /// Both channels are attempted even if one fails; ordering between them
    /// is unspecified. The returned handle is not joined against any
    /// caller's response path.
    fn emit(&self, event: ResourceEvent) -> JoinHandle<()> {
        let live_feed = Arc::clone(&self.live_feed);
        let publisher = Arc::clone(&self.publisher);

        tokio::spawn(async move {
            live_feed.send_to_all(&event);

            let routing_key = event.routing_key();
            if let Err(err) = publisher.publish(&routing_key, &event).await {
                counter!("resman_publish_failures_total").increment(1);
                warn!(
                    routing_key = %routing_key,
                    resource_id = %event.resource_id(),
                    error = %err,
                    "Durable publish failed; committed mutation stands"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ResmanError};
    use crate::model::{ActorRole, ResourceCategory, RevisionToken};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct RecordingPublisher {
        published: AtomicUsize,
        notify: Notify,
        fail: bool,
    }

    impl RecordingPublisher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                published: AtomicUsize::new(0),
                notify: Notify::new(),
                fail,
            })
        }

        async fn wait_for_attempt(&self) {
            self.notify.notified().await;
        }

        fn attempts(&self) -> usize {
            self.published.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, _routing_key: &str, _event: &ResourceEvent) -> Result<()> {
            self.published.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
            if self.fail {
                Err(ResmanError::publish_failed("simulated broker outage"))
            } else {
                Ok(())
            }
        }
    }

    fn member() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Member,
        }
    }

    fn admin() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Admin,
        }
    }

    fn draft(name: &str) -> ResourceDraft {
        ResourceDraft {
            name: name.into(),
            description: Some("test".into()),
            location: None,
            category: ResourceCategory::Hardware,
        }
    }

    fn changes(resource: &Resource, name: &str) -> ResourceChanges {
        ResourceChanges {
            name: name.into(),
            description: resource.description.clone(),
            location: resource.location.clone(),
            category: resource.category,
            expected_version: resource.version,
        }
    }

    fn pipeline(publisher: Arc<RecordingPublisher>) -> MutationPipeline {
        MutationPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LiveFeed::new(64)),
            publisher,
        )
    }

    #[tokio::test]
    async fn test_create_emits_to_both_channels() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher.clone());
        let mut live_rx = pipeline.live_feed().subscribe();

        let created = pipeline.create(draft("Laptop A"), member()).await.unwrap();
        assert_eq!(created.created_at, created.last_updated_at);

        let event = live_rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "resource-created");
        assert_eq!(event.resource_id(), created.id);

        publisher.wait_for_attempt().await;
        assert_eq!(publisher.attempts(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft_without_touching_store() {
        let publisher = RecordingPublisher::new(false);
        let store = Arc::new(MemoryStore::new());
        let pipeline = MutationPipeline::new(
            store.clone(),
            Arc::new(LiveFeed::new(8)),
            publisher.clone(),
        );

        let mut bad = draft("ok");
        bad.name = String::new();
        let err = pipeline.create(bad, member()).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(store.is_empty());
        assert_eq!(publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_update_advances_timestamp_and_version() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher);
        let actor = member();

        let created = pipeline.create(draft("Laptop A"), actor).await.unwrap();
        let updated = pipeline
            .update(created.id, changes(&created, "Laptop A2"), actor)
            .await
            .unwrap();

        assert_eq!(updated.name, "Laptop A2");
        assert_ne!(updated.version, created.version);
        assert!(updated.last_updated_at > created.last_updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.created_by, created.created_by);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_is_not_emitted() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher.clone());
        let actor = member();

        let created = pipeline.create(draft("Laptop A"), actor).await.unwrap();
        publisher.wait_for_attempt().await;

        pipeline
            .update(created.id, changes(&created, "first writer"), actor)
            .await
            .unwrap();
        publisher.wait_for_attempt().await;
        let attempts_after_winner = publisher.attempts();

        // Second writer carries the token observed before the first write.
        let err = pipeline
            .update(created.id, changes(&created, "second writer"), actor)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionConflict);

        // Loser produced no emission.
        assert_eq!(publisher.attempts(), attempts_after_winner);

        // Final state is exactly the winner's.
        let current = pipeline.get(created.id).await.unwrap();
        assert_eq!(current.name, "first writer");
    }

    #[tokio::test]
    async fn test_concurrent_updates_from_same_token_have_one_winner() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher);
        let actor = member();

        let created = pipeline.create(draft("Laptop A"), actor).await.unwrap();

        let id = created.id;
        let mut handles = Vec::new();
        for i in 0..8 {
            let pipeline = pipeline.clone();
            let changes = changes(&created, &format!("writer {}", i));
            handles.push(tokio::spawn(async move {
                pipeline.update(id, changes, actor).await
            }));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => {
                    assert_eq!(err.code(), ErrorCode::VersionConflict);
                    conflicts += 1;
                }
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_delete_twice_yields_success_then_not_found() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher);

        let created = pipeline.create(draft("Laptop A"), member()).await.unwrap();

        pipeline.delete(created.id, admin()).await.unwrap();
        let err = pipeline.delete(created.id, admin()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RecordNotFound);

        // No resurrection: reads stay not-found.
        let err = pipeline.get(created.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_delete_emits_tombstone_with_audit_fields() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher);
        let mut live_rx = pipeline.live_feed().subscribe();
        let deleter = admin();

        let created = pipeline.create(draft("Laptop A"), member()).await.unwrap();
        live_rx.recv().await.unwrap();

        pipeline.delete(created.id, deleter).await.unwrap();
        let event = live_rx.recv().await.unwrap();
        match event {
            ResourceEvent::Deleted {
                resource_id,
                name,
                deleted_by,
                ..
            } => {
                assert_eq!(resource_id, created.id);
                assert_eq!(name, "Laptop A");
                assert_eq!(deleted_by, deleter.id);
            }
            other => panic!("expected tombstone, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publisher_failure_never_changes_outcome() {
        let publisher = RecordingPublisher::new(true);
        let pipeline = pipeline(publisher.clone());
        let actor = member();

        // Create, update, and delete all succeed while every publish fails.
        let created = pipeline.create(draft("Laptop A"), actor).await.unwrap();
        publisher.wait_for_attempt().await;

        let updated = pipeline
            .update(created.id, changes(&created, "Laptop A2"), actor)
            .await
            .unwrap();
        publisher.wait_for_attempt().await;

        pipeline.delete(updated.id, admin()).await.unwrap();
        publisher.wait_for_attempt().await;

        assert_eq!(publisher.attempts(), 3);
        // The write was never rolled back along the way: the final delete
        // found the updated row.
    }

    #[tokio::test]
    async fn test_update_missing_resource_is_not_found() {
        let publisher = RecordingPublisher::new(false);
        let pipeline = pipeline(publisher);

        let err = pipeline
            .update(
                Uuid::new_v4(),
                ResourceChanges {
                    name: "ghost".into(),
                    description: None,
                    location: None,
                    category: ResourceCategory::Other,
                    expected_version: RevisionToken::fresh(),
                },
                member(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RecordNotFound);
    }
}
