//! In-memory durable store for tests and local use.

use super::{
    AccountStore, DurableStore, Project, ShapeFeed, StoreError, StoreResult, User, UserId,
};
use crate::shapes::{ProjectId, Shape, ShapeId, ShapePatch};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

struct Account {
    user: User,
    salt: String,
    password_hash: String,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn lock_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Lock(e.to_string())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Durable and account store kept entirely in memory.
///
/// Every shape mutation pushes a fresh snapshot to each watcher of the
/// affected project, like a reactive query would.
#[derive(Default)]
pub struct MemoryStore {
    shapes: RwLock<HashMap<ProjectId, Vec<Shape>>>,
    watchers: Mutex<Vec<(ProjectId, Sender<Vec<Shape>>)>>,
    projects: RwLock<Vec<Project>>,
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicU64,
    fail_next: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` shape submissions fail as unavailable.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Current shapes of a project, in stored order.
    pub fn shapes(&self, project: &ProjectId) -> StoreResult<Vec<Shape>> {
        let shapes = self.shapes.read().map_err(lock_err)?;
        Ok(shapes.get(project).cloned().unwrap_or_default())
    }

    fn mint_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n}")
    }

    fn check_available(&self) -> StoreResult<()> {
        let armed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match armed {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    /// Push the current list of `project` to its watchers, dropping closed ones.
    fn notify(&self, project: &ProjectId) -> StoreResult<()> {
        let snapshot = self.shapes(project)?;
        let mut watchers = self.watchers.lock().map_err(lock_err)?;
        watchers.retain(|(watched, tx)| watched != project || tx.send(snapshot.clone()).is_ok());
        Ok(())
    }
}

impl DurableStore for MemoryStore {
    fn watch_shapes(&self, project: &ProjectId) -> StoreResult<ShapeFeed> {
        let (tx, rx) = channel();
        let snapshot = self.shapes(project)?;
        // Receiver is alive, so the initial send cannot fail.
        let _ = tx.send(snapshot);
        self.watchers
            .lock()
            .map_err(lock_err)?
            .push((project.clone(), tx));
        Ok(ShapeFeed::new(rx))
    }

    fn create_shape(&self, project: &ProjectId, shape: &Shape) -> StoreResult<ShapeId> {
        self.check_available()?;
        let id = ShapeId::new(self.mint_id("s"));
        let mut stored = shape.clone();
        stored.id = id.clone();
        stored.project_id = project.clone();
        self.shapes
            .write()
            .map_err(lock_err)?
            .entry(project.clone())
            .or_default()
            .push(stored);
        self.notify(project)?;
        Ok(id)
    }

    fn update_shape(&self, id: &ShapeId, patch: &ShapePatch) -> StoreResult<()> {
        self.check_available()?;
        let project = {
            let mut shapes = self.shapes.write().map_err(lock_err)?;
            let (project, shape) = shapes
                .iter_mut()
                .find_map(|(project, list)| {
                    list.iter_mut()
                        .find(|s| &s.id == id)
                        .map(|shape| (project.clone(), shape))
                })
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch.apply(shape)?;
            project
        };
        self.notify(&project)
    }

    fn delete_shapes(&self, ids: &[ShapeId]) -> StoreResult<()> {
        self.check_available()?;
        let touched: Vec<ProjectId> = {
            let mut shapes = self.shapes.write().map_err(lock_err)?;
            shapes
                .iter_mut()
                .filter_map(|(project, list)| {
                    let before = list.len();
                    list.retain(|s| !ids.contains(&s.id));
                    (list.len() != before).then(|| project.clone())
                })
                .collect()
        };
        for project in &touched {
            self.notify(project)?;
        }
        Ok(())
    }

    fn list_projects(&self, owner: &UserId) -> StoreResult<Vec<Project>> {
        let projects = self.projects.read().map_err(lock_err)?;
        Ok(projects
            .iter()
            .filter(|p| &p.owner_id == owner)
            .cloned()
            .collect())
    }

    fn get_project(&self, id: &ProjectId) -> StoreResult<Project> {
        let projects = self.projects.read().map_err(lock_err)?;
        projects
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn create_project(&self, title: &str, owner: &UserId) -> StoreResult<ProjectId> {
        let project = Project {
            id: self.mint_id("p"),
            title: title.to_string(),
            owner_id: owner.clone(),
            created_at: now_millis(),
        };
        let id = project.id.clone();
        self.projects.write().map_err(lock_err)?.push(project);
        Ok(id)
    }
}

impl AccountStore for MemoryStore {
    fn create_account(&self, email: &str, password: &str, name: &str) -> StoreResult<User> {
        let mut accounts = self.accounts.write().map_err(lock_err)?;
        if accounts.contains_key(email) {
            return Err(StoreError::EmailTaken);
        }
        let salt = Uuid::new_v4().simple().to_string();
        let user = User {
            id: self.mint_id("u"),
            email: email.to_string(),
            name: name.to_string(),
        };
        accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        Ok(user)
    }

    fn verify_credentials(&self, email: &str, password: &str) -> StoreResult<User> {
        let accounts = self.accounts.read().map_err(lock_err)?;
        accounts
            .get(email)
            .filter(|a| a.password_hash == hash_password(&a.salt, password))
            .map(|a| a.user.clone())
            .ok_or(StoreError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ShapeKind, ShapeStyle};
    use kurbo::Rect;

    fn rect() -> Shape {
        Shape::new(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 40.0, 40.0),
            ShapeStyle::default(),
        )
    }

    #[test]
    fn test_create_assigns_permanent_id_and_notifies() {
        let store = MemoryStore::new();
        let project = "p-test".to_string();
        let feed = store.watch_shapes(&project).unwrap();
        assert_eq!(feed.latest(), Some(Vec::new()));

        let local = rect();
        let id = store.create_shape(&project, &local).unwrap();
        assert!(!id.is_temporary());
        assert_ne!(id, local.id);

        let snapshot = feed.latest().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
        assert_eq!(snapshot[0].project_id, project);
    }

    #[test]
    fn test_feed_keeps_only_latest() {
        let store = MemoryStore::new();
        let project = "p".to_string();
        let feed = store.watch_shapes(&project).unwrap();
        store.create_shape(&project, &rect()).unwrap();
        store.create_shape(&project, &rect()).unwrap();
        assert_eq!(feed.latest().map(|s| s.len()), Some(2));
        assert_eq!(feed.latest(), None);
    }

    #[test]
    fn test_update_and_delete() {
        let store = MemoryStore::new();
        let project = "p".to_string();
        let id = store.create_shape(&project, &rect()).unwrap();
        store
            .update_shape(&id, &ShapePatch::Rotate { rotation: 30.0 })
            .unwrap();
        assert_eq!(store.shapes(&project).unwrap()[0].rotation, 30.0);

        store.delete_shapes(&[id.clone()]).unwrap();
        assert!(store.shapes(&project).unwrap().is_empty());
        // Deleting again is a no-op.
        store.delete_shapes(&[id.clone()]).unwrap();
        assert!(matches!(
            store.update_shape(&id, &ShapePatch::Rotate { rotation: 1.0 }),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_patch_rejected() {
        let store = MemoryStore::new();
        let id = store.create_shape(&"p".to_string(), &rect()).unwrap();
        let bad = ShapePatch::Bounds { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };
        assert!(matches!(store.update_shape(&id, &bad), Err(StoreError::Rejected(_))));
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new();
        let project = "p".to_string();
        store.fail_next(1);
        assert!(matches!(
            store.create_shape(&project, &rect()),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.create_shape(&project, &rect()).is_ok());
    }

    #[test]
    fn test_dropped_feed_is_pruned() {
        let store = MemoryStore::new();
        let project = "p".to_string();
        drop(store.watch_shapes(&project).unwrap());
        store.create_shape(&project, &rect()).unwrap();
        assert!(store.watchers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_projects_by_owner() {
        let store = MemoryStore::new();
        let alice = "u-alice".to_string();
        let first = store.create_project("Sketches", &alice).unwrap();
        store.create_project("Other", &"u-bob".to_string()).unwrap();
        let second = store.create_project("Plans", &alice).unwrap();

        let titles: Vec<_> = store
            .list_projects(&alice)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(titles, vec![first.clone(), second]);
        assert_eq!(store.get_project(&first).unwrap().title, "Sketches");
    }

    #[test]
    fn test_accounts() {
        let store = MemoryStore::new();
        let user = store.create_account("a@example.com", "hunter2", "Ada").unwrap();
        let err = store
            .create_account("a@example.com", "other", "Imposter")
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        assert_eq!(store.verify_credentials("a@example.com", "hunter2").unwrap(), user);
        assert!(matches!(
            store.verify_credentials("a@example.com", "wrong"),
            Err(StoreError::InvalidCredentials)
        ));
        assert!(matches!(
            store.verify_credentials("nobody@example.com", "hunter2"),
            Err(StoreError::InvalidCredentials)
        ));
    }
}
