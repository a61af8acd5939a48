//! # Persistence Port
//!
//! The durable read/write boundary of the Business Store.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PersistencePort                                  │
//! │                                                                         │
//! │  load_all(scope)        called once, before any mutation is accepted   │
//! │  write(scope, change)   one call per accepted mutation, in order,      │
//! │                         from the store's single write worker           │
//! │  subscribe(scope)       Some(Subscription) for realtime backends,      │
//! │                         None for local-only ones                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upserts are last-write-wins on the entity's `updated_at`: a port must
//! not let an older document replace a newer one.
//!
//! ## Realizations
//! - [`MemoryPort`] - local-only store, also the test fake
//! - [`SqlitePort`] - SQLite documents with a polled change feed

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use bizbook_core::{Entity, EntityChange, RemoteChange, Scope};

use crate::error::PortResult;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryPort;
pub use sqlite::SqlitePort;

/// Channel depth between a change feed and the reconciler.
pub const SUBSCRIPTION_BUFFER: usize = 256;

#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Every entity stored under `scope`, in insertion order.
    async fn load_all(&self, scope: &Scope) -> PortResult<Vec<Entity>>;

    /// Applies one upsert or delete.
    async fn write(&self, scope: &Scope, change: &EntityChange) -> PortResult<()>;

    /// Starts delivering changes made by other writers, or returns `None`
    /// when the backend has no change feed.
    async fn subscribe(&self, scope: &Scope) -> PortResult<Option<Subscription>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Live change feed handed out by [`PersistencePort::subscribe`].
///
/// Dropping it (or calling [`Subscription::cancel`]) stops the feed.
#[derive(Debug)]
pub struct Subscription {
    changes: mpsc::Receiver<RemoteChange>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// A subscription together with the sender feeding it.
    pub fn channel() -> (mpsc::Sender<RemoteChange>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (tx, Subscription::new(rx))
    }

    pub fn new(changes: mpsc::Receiver<RemoteChange>) -> Self {
        Subscription {
            changes,
            cancel: None,
        }
    }

    /// Attaches a cancel signal for a producer task.
    pub fn with_cancel(mut self, cancel: oneshot::Sender<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Next change, or `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<RemoteChange> {
        self.changes.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.changes.close();
    }
}
