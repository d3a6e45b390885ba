//! Optimistic sync with the durable store.
//!
//! Local edits are applied to the [`ShapeStore`](crate::store::ShapeStore)
//! by the caller first; this engine only queues the matching requests and
//! fires them at the store. There is no retry and no merge: whatever
//! snapshot the store delivers last replaces local state wholesale.

use crate::shapes::{ProjectId, Shape, ShapeId, ShapePatch};
use crate::storage::{DurableStore, ShapeFeed, StoreError, StoreResult};
use std::collections::{HashMap, HashSet, VecDeque};

/// A submission waiting in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// `local_id` is the id the shape carries on this client.
    Create { local_id: ShapeId, shape: Shape },
    Update { id: ShapeId, patch: ShapePatch },
    Delete { ids: Vec<ShapeId> },
}

impl StoreRequest {
    pub fn verb(&self) -> &'static str {
        match self {
            StoreRequest::Create { .. } => "create",
            StoreRequest::Update { .. } => "update",
            StoreRequest::Delete { .. } => "delete",
        }
    }

    /// Whether this request refers to `id`.
    pub fn targets(&self, id: &ShapeId) -> bool {
        match self {
            StoreRequest::Create { local_id, .. } => local_id == id,
            StoreRequest::Update { id: target, .. } => target == id,
            StoreRequest::Delete { ids } => ids.contains(id),
        }
    }
}

/// A submission the store refused or never received.
#[derive(Debug)]
pub struct SyncFailure {
    pub request: StoreRequest,
    pub error: StoreError,
}

/// Connection indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
    /// Local edits are waiting to be submitted.
    Syncing,
}

pub struct SyncEngine {
    project: ProjectId,
    feed: Option<ShapeFeed>,
    outbox: VecDeque<StoreRequest>,
    /// Local id to permanent id, for creates the store acknowledged.
    confirmed: HashMap<ShapeId, ShapeId>,
    /// Local ids whose create failed; later requests for them are dropped.
    abandoned: HashSet<ShapeId>,
}

impl SyncEngine {
    pub fn new(project: impl Into<ProjectId>) -> Self {
        Self {
            project: project.into(),
            feed: None,
            outbox: VecDeque::new(),
            confirmed: HashMap::new(),
            abandoned: HashSet::new(),
        }
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Open the snapshot subscription for this engine's project.
    pub fn subscribe(&mut self, store: &dyn DurableStore) -> StoreResult<()> {
        self.feed = Some(store.watch_shapes(&self.project)?);
        log::info!("subscribed to shapes of project {}", self.project);
        Ok(())
    }

    /// Detach the subscription. Queued requests stay queued.
    pub fn unsubscribe(&mut self) {
        if self.feed.take().is_some() {
            log::info!("unsubscribed from project {}", self.project);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.feed.is_some()
    }

    pub fn submit_create(&mut self, shape: &Shape) {
        self.outbox.push_back(StoreRequest::Create {
            local_id: shape.id.clone(),
            shape: shape.clone(),
        });
    }

    pub fn submit_update(&mut self, id: &ShapeId, patch: ShapePatch) {
        self.outbox.push_back(StoreRequest::Update {
            id: id.clone(),
            patch,
        });
    }

    pub fn submit_delete(&mut self, ids: Vec<ShapeId>) {
        if !ids.is_empty() {
            self.outbox.push_back(StoreRequest::Delete { ids });
        }
    }

    /// Requests not yet sent.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// The id the store knows a shape by.
    pub fn resolve(&self, id: &ShapeId) -> ShapeId {
        self.confirmed.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    /// Send every queued request, in order, without retrying failures.
    pub fn flush(&mut self, store: &dyn DurableStore) -> Vec<SyncFailure> {
        let mut failures = Vec::new();
        while let Some(request) = self.outbox.pop_front() {
            if let Err(error) = self.send(store, &request) {
                log::warn!("{} submission failed: {error}", request.verb());
                failures.push(SyncFailure { request, error });
            }
        }
        failures
    }

    fn send(&mut self, store: &dyn DurableStore, request: &StoreRequest) -> StoreResult<()> {
        match request {
            StoreRequest::Create { local_id, shape } => match store.create_shape(&self.project, shape) {
                Ok(permanent) => {
                    log::debug!("create {local_id} acknowledged as {permanent}");
                    self.confirmed.insert(local_id.clone(), permanent);
                    Ok(())
                }
                Err(e) => {
                    self.abandoned.insert(local_id.clone());
                    Err(e)
                }
            },
            StoreRequest::Update { id, patch } => {
                if self.abandoned.contains(id) {
                    log::warn!("dropping update for {id}: its create never reached the store");
                    return Ok(());
                }
                store.update_shape(&self.resolve(id), patch)
            }
            StoreRequest::Delete { ids } => {
                let targets: Vec<ShapeId> = ids
                    .iter()
                    .filter(|id| !self.abandoned.contains(*id))
                    .map(|id| self.resolve(id))
                    .collect();
                // Nothing names a deleted local id again, barring a fresh create.
                for id in ids {
                    self.confirmed.remove(id);
                    self.abandoned.remove(id);
                }
                if targets.is_empty() {
                    return Ok(());
                }
                store.delete_shapes(&targets)
            }
        }
    }

    /// Newest snapshot delivered since the last call, if any.
    pub fn latest_snapshot(&self) -> Option<Vec<Shape>> {
        self.feed.as_ref()?.latest()
    }

    /// Forget local ids whose permanent counterpart appears in `snapshot`,
    /// returning the local-to-permanent pairs so callers can re-key any
    /// state that still names the local ids.
    ///
    /// Failed creates are forgotten too once no queued request names them,
    /// since the snapshot removes their shapes from the client.
    pub fn settle(&mut self, snapshot: &[Shape]) -> HashMap<ShapeId, ShapeId> {
        let outbox = &self.outbox;
        self.abandoned
            .retain(|id| outbox.iter().any(|request| request.targets(id)));

        let present: HashSet<&ShapeId> = snapshot.iter().map(|s| &s.id).collect();
        let settled: Vec<ShapeId> = self
            .confirmed
            .iter()
            .filter(|(_, permanent)| present.contains(permanent))
            .map(|(local, _)| local.clone())
            .collect();
        settled
            .into_iter()
            .filter_map(|local| self.confirmed.remove_entry(&local))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ShapeKind, ShapeStyle};
    use crate::storage::MemoryStore;
    use kurbo::Rect;

    fn rect() -> Shape {
        Shape::new(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 40.0, 40.0),
            ShapeStyle::default(),
        )
    }

    #[test]
    fn test_update_after_create_targets_permanent_id() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        let shape = rect();
        engine.submit_create(&shape);
        engine.submit_update(&shape.id, ShapePatch::Rotate { rotation: 45.0 });
        assert_eq!(engine.pending(), 2);

        assert!(engine.flush(&store).is_empty());
        assert_eq!(engine.pending(), 0);
        let stored = store.shapes(&"p".to_string()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rotation, 45.0);
        assert_eq!(engine.resolve(&shape.id), stored[0].id);
    }

    #[test]
    fn test_failed_create_drops_followups() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let mut engine = SyncEngine::new("p");
        let shape = rect();
        engine.submit_create(&shape);
        engine.submit_update(&shape.id, ShapePatch::Rotate { rotation: 45.0 });
        engine.submit_delete(vec![shape.id.clone()]);

        let failures = engine.flush(&store);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].request.verb(), "create");
        assert!(store.shapes(&"p".to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_failures_are_not_retried() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        engine.submit_update(&ShapeId::new("missing"), ShapePatch::Rotate { rotation: 1.0 });
        assert_eq!(engine.flush(&store).len(), 1);
        assert!(engine.flush(&store).is_empty());
    }

    #[test]
    fn test_delete_of_missing_id_is_noop() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        engine.submit_delete(vec![ShapeId::new("gone")]);
        assert!(engine.flush(&store).is_empty());
    }

    #[test]
    fn test_delete_forgets_local_ids() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        let kept = rect();
        let removed = rect();
        engine.submit_create(&kept);
        engine.submit_create(&removed);
        engine.submit_delete(vec![removed.id.clone()]);
        assert!(engine.flush(&store).is_empty());

        assert_eq!(engine.confirmed.len(), 1);
        assert!(engine.confirmed.contains_key(&kept.id));
        assert_eq!(engine.resolve(&removed.id), removed.id);
        assert_eq!(store.shapes(&"p".to_string()).unwrap().len(), 1);
    }

    #[test]
    fn test_settle_forgets_failed_creates() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        engine.subscribe(&store).unwrap();
        store.fail_next(1);
        let failed = rect();
        engine.submit_create(&failed);
        assert_eq!(engine.flush(&store).len(), 1);
        assert!(engine.abandoned.contains(&failed.id));

        // Still named by a queued request: kept so the update is dropped.
        engine.submit_update(&failed.id, ShapePatch::Rotate { rotation: 10.0 });
        engine.settle(&[]);
        assert!(engine.abandoned.contains(&failed.id));
        assert!(engine.flush(&store).is_empty());

        engine.settle(&[]);
        assert!(engine.abandoned.is_empty());
    }

    #[test]
    fn test_snapshot_and_settle() {
        let store = MemoryStore::new();
        let mut engine = SyncEngine::new("p");
        engine.subscribe(&store).unwrap();
        assert_eq!(engine.latest_snapshot(), Some(Vec::new()));

        let shape = rect();
        engine.submit_create(&shape);
        engine.flush(&store);
        let snapshot = engine.latest_snapshot().unwrap();
        let settled = engine.settle(&snapshot);
        assert_eq!(settled.get(&shape.id), Some(&snapshot[0].id));
        // Settled ids are forgotten.
        assert!(engine.settle(&snapshot).is_empty());

        engine.unsubscribe();
        assert!(!engine.is_subscribed());
        assert_eq!(engine.latest_snapshot(), None);
    }
}
