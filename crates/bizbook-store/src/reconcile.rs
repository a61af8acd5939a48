//! # Remote Change Reconciler
//!
//! Applies change-feed notifications to the store's collections.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RemoteChange::Insert / Update  ──► upsert by id (field overwrite)      │
//! │  RemoteChange::Delete           ──► remove by id                        │
//! │                                                                         │
//! │  • No derived-field recomputation: the remote writer already did it     │
//! │  • No write back to the port                                            │
//! │  • A notification equal to what is held is a no-op (no event)           │
//! │  • Latest notification wins; no version checks                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reconciler only holds a weak reference, so it never keeps a dropped
//! store alive.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::port::Subscription;
use crate::store::WeakBusinessStore;

pub struct Reconciler {
    store: WeakBusinessStore,
    subscription: Subscription,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ReconcilerHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| StoreError::ChannelError("Reconciler already stopped".into()))
    }
}

impl Reconciler {
    pub fn new(store: WeakBusinessStore, subscription: Subscription) -> (Self, ReconcilerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let reconciler = Reconciler {
            store,
            subscription,
            shutdown_rx,
        };
        (reconciler, ReconcilerHandle { shutdown_tx })
    }

    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Reconciler starting");

        loop {
            tokio::select! {
                change = self.subscription.recv() => {
                    let Some(change) = change else {
                        debug!("Change feed ended");
                        break;
                    };
                    let Some(store) = self.store.upgrade() else {
                        debug!("Store dropped");
                        break;
                    };
                    store.apply_remote(change);
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reconciler shutting down");
                    break;
                }
            }
        }

        self.subscription.cancel();
        info!("Reconciler stopped");
    }
}
