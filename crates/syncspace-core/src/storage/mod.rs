//! Interfaces to the durable store and the account store.
//!
//! The durable store is the authority on the shape list. The client only
//! talks to it through [`DurableStore`]: CRUD submissions plus a reactive
//! [`ShapeFeed`] that delivers whole snapshots.

mod memory;

pub use memory::MemoryStore;

use crate::shapes::{PatchError, ProjectId, Shape, ShapeId, ShapePatch};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, TryRecvError};
use thiserror::Error;

/// Identifier of a user account.
pub type UserId = String;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("Email already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(#[from] PatchError),
    #[error("lock error: {0}")]
    Lock(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A whiteboard project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub owner_id: UserId,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// Public part of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// Subscription to a project's shape list.
///
/// Each message is a complete snapshot. Dropping the feed unsubscribes.
pub struct ShapeFeed {
    rx: Receiver<Vec<Shape>>,
}

impl ShapeFeed {
    pub fn new(rx: Receiver<Vec<Shape>>) -> Self {
        Self { rx }
    }

    /// Drain everything delivered so far and keep only the newest snapshot.
    pub fn latest(&self) -> Option<Vec<Shape>> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => newest = Some(snapshot),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return newest,
            }
        }
    }
}

/// The authoritative shape store, keyed by project.
///
/// Calls come from the UI thread and must return promptly. Remote
/// implementations report transport trouble as [`StoreError::Unavailable`].
pub trait DurableStore: Send + Sync {
    /// Subscribe to snapshots of a project's shapes. The current list is
    /// delivered right away.
    fn watch_shapes(&self, project: &ProjectId) -> StoreResult<ShapeFeed>;

    /// Persist a new shape and return its permanent id.
    fn create_shape(&self, project: &ProjectId, shape: &Shape) -> StoreResult<ShapeId>;

    fn update_shape(&self, id: &ShapeId, patch: &ShapePatch) -> StoreResult<()>;

    /// Remove shapes. Ids that are already gone are ignored.
    fn delete_shapes(&self, ids: &[ShapeId]) -> StoreResult<()>;

    /// Projects owned by `owner`, in creation order.
    fn list_projects(&self, owner: &UserId) -> StoreResult<Vec<Project>>;

    fn get_project(&self, id: &ProjectId) -> StoreResult<Project>;

    fn create_project(&self, title: &str, owner: &UserId) -> StoreResult<ProjectId>;
}

/// Account registration and sign-in.
pub trait AccountStore: Send + Sync {
    /// Register a new account. Fails with [`StoreError::EmailTaken`] when the
    /// email is already in use.
    fn create_account(&self, email: &str, password: &str, name: &str) -> StoreResult<User>;

    fn verify_credentials(&self, email: &str, password: &str) -> StoreResult<User>;
}
