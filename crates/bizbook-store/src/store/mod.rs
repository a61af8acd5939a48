//! # Business Store
//!
//! The single in-process owner of the business collections.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BusinessStore::new(port, config)          phase = Loading              │
//! │       │                                    mutations → NotLoaded        │
//! │       ▼                                                                 │
//! │  load().await                                                           │
//! │    1. port.subscribe(scope)     (realtime ports only)                   │
//! │    2. port.load_all(scope)      exactly once                            │
//! │    3. seed sample data          if empty and seed_on_empty              │
//! │    4. spawn WriteWorker, spawn Reconciler                               │
//! │       │                                    phase = Ready                │
//! │       ▼                                                                 │
//! │  add_* / update_* / delete_*   ──► in-memory change ──► WriteQueue      │
//! │  queries / analytics           ──► read lock, pure fold                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shutdown().await   stop reconciler, drain writes    phase = Stopped    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//! Every mutation runs under one write lock: validation, the in-memory
//! change, derived-field maintenance and the enqueue of its writes. No
//! reader sees an invoice whose totals disagree with its payments, and the
//! write queue receives changes in the order they were applied.
//!
//! Mutations are synchronous. Persistence is asynchronous and never rolls
//! the in-memory state back; failures arrive as
//! [`StoreEvent::PersistenceFailed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bizbook_core::invoice::customer_outstanding;
use bizbook_core::{
    Actor, BusinessData, BusinessSettings, Entity, EntityChange, EntityCounts, EntityKind,
    RemoteChange, Scope,
};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::{ChangeType, StoreEvent};
use crate::port::PersistencePort;
use crate::reconcile::{Reconciler, ReconcilerHandle};
use crate::seed;
use crate::writer::{RetryPolicy, WriteQueue, WriteWorker};

mod customers;
mod expenses;
mod invoices;
mod payments;
mod products;
mod reports;
mod stock;
mod vendors;

// =============================================================================
// Phase & State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    /// Waiting for the initial load. Mutations are rejected.
    Loading,
    Ready,
    Stopped,
}

struct State {
    phase: StorePhase,
    data: BusinessData,
    queue: Option<WriteQueue>,
}

#[derive(Default)]
struct Tasks {
    writer: Option<JoinHandle<()>>,
    reconciler: Option<(ReconcilerHandle, JoinHandle<()>)>,
}

struct Inner {
    port: Arc<dyn PersistencePort>,
    config: StoreConfig,
    scope: Scope,
    state: RwLock<State>,
    events: broadcast::Sender<StoreEvent>,
    load_started: AtomicBool,
    tasks: Mutex<Tasks>,
}

// =============================================================================
// Change Batch
// =============================================================================

/// Writes and events produced by one mutation, released on commit.
#[derive(Default)]
struct ChangeBatch {
    writes: Vec<EntityChange>,
    events: Vec<StoreEvent>,
}

impl ChangeBatch {
    fn upsert(&mut self, data: &mut BusinessData, entity: Entity) {
        let kind = entity.kind();
        let id = entity.id().to_string();
        let change = if data.upsert(entity.clone()) {
            ChangeType::Updated
        } else {
            ChangeType::Created
        };
        self.writes.push(EntityChange::upsert(entity));
        self.events.push(StoreEvent::local(kind, id, change));
    }

    fn remove(&mut self, data: &mut BusinessData, kind: EntityKind, id: &str) {
        if data.remove(kind, id) {
            self.writes.push(EntityChange::delete(kind, id));
            self.events.push(StoreEvent::local(kind, id, ChangeType::Deleted));
        }
    }

    /// Re-derives a customer's outstanding balance and stages the customer
    /// when it changed.
    fn refresh_outstanding(
        &mut self,
        data: &mut BusinessData,
        customer_id: &str,
        now: chrono::DateTime<Utc>,
    ) {
        let outstanding = customer_outstanding(customer_id, &data.invoices).cents();
        let Some(customer) = data.customer(customer_id) else {
            return;
        };
        if customer.outstanding_balance_cents == outstanding {
            return;
        }

        let mut customer = customer.clone();
        customer.outstanding_balance_cents = outstanding;
        customer.updated_at = now;
        self.upsert(data, Entity::Customer(customer));
    }
}

// =============================================================================
// Business Store
// =============================================================================

/// Handle to the Business Store. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct BusinessStore {
    inner: Arc<Inner>,
}

/// Non-owning handle, used by background tasks.
#[derive(Clone)]
pub struct WeakBusinessStore {
    inner: Weak<Inner>,
}

impl WeakBusinessStore {
    pub fn upgrade(&self) -> Option<BusinessStore> {
        self.inner.upgrade().map(|inner| BusinessStore { inner })
    }
}

impl std::fmt::Debug for BusinessStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessStore")
            .field("scope", &self.inner.scope)
            .field("port", &self.inner.port.name())
            .field("phase", &self.phase())
            .finish()
    }
}

impl BusinessStore {
    /// Creates a store in the `Loading` phase. Nothing is read until
    /// [`BusinessStore::load`].
    pub fn new(port: Arc<dyn PersistencePort>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(config.store.event_capacity.max(1));
        let scope = config.scope();

        BusinessStore {
            inner: Arc::new(Inner {
                port,
                scope,
                config,
                state: RwLock::new(State {
                    phase: StorePhase::Loading,
                    data: BusinessData::default(),
                    queue: None,
                }),
                events,
                load_started: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Creates a store scoped to the signed-in actor. Created entities are
    /// tagged with the actor's id; no authorization is applied.
    pub fn for_actor(port: Arc<dyn PersistencePort>, mut config: StoreConfig, actor: &Actor) -> Self {
        info!(actor_id = %actor.id, role = ?actor.role, "Scoping store to actor");
        config.business.owner_id = actor.id.clone();
        Self::new(port, config)
    }

    pub fn downgrade(&self) -> WeakBusinessStore {
        WeakBusinessStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Adopts whatever the port holds for this scope and starts accepting
    /// mutations.
    ///
    /// ## Errors
    /// - `AlreadyLoaded` on a second call
    /// - `Stopped` after shutdown
    /// - `Port(..)` when the initial load fails; `load` may be called again
    pub async fn load(&self) -> StoreResult<EntityCounts> {
        if self.inner.load_started.swap(true, Ordering::SeqCst) {
            return Err(StoreError::AlreadyLoaded);
        }
        if self.phase() == StorePhase::Stopped {
            return Err(StoreError::Stopped);
        }

        let port = self.inner.port.clone();
        let scope = self.inner.scope.clone();
        let config = &self.inner.config;
        info!(port = port.name(), scope = %scope, "Loading business data");

        // Subscribing first means nothing written between the load and the
        // subscription is missed. Replays of loaded rows are harmless.
        let subscription = if config.persistence.subscribe {
            match port.subscribe(&scope).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(?e, "Change feed unavailable, continuing without realtime updates");
                    None
                }
            }
        } else {
            None
        };

        let entities = match port.load_all(&scope).await {
            Ok(entities) => entities,
            Err(e) => {
                error!(?e, scope = %scope, "Initial load failed");
                self.inner.load_started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let mut data = BusinessData::from_entities(entities);
        let (worker, queue) = WriteWorker::new(
            port.clone(),
            scope.clone(),
            RetryPolicy::from_config(config),
            self.inner.events.clone(),
        );

        if data.is_empty() && config.store.seed_on_empty {
            data = seed::sample_data(&scope, config.settings(), Utc::now());
            for entity in data.clone().into_entities() {
                queue.enqueue(EntityChange::upsert(entity))?;
            }
            info!(counts = ?data.counts(), "Seeded sample data");
        }

        let counts = data.counts();
        {
            let mut state = self.write_state();
            // shutdown may have run while the port was loading.
            if state.phase == StorePhase::Stopped {
                drop(state);
                if let Some(mut subscription) = subscription {
                    subscription.cancel();
                }
                warn!(scope = %scope, "Store stopped during load, discarding loaded data");
                return Err(StoreError::Stopped);
            }
            state.data = data;
            state.queue = Some(queue);
            state.phase = StorePhase::Ready;
        }

        let mut tasks = self.inner.tasks.lock().await;
        tasks.writer = Some(tokio::spawn(worker.run()));
        if let Some(subscription) = subscription {
            let (reconciler, handle) = Reconciler::new(self.downgrade(), subscription);
            tasks.reconciler = Some((handle, tokio::spawn(reconciler.run())));
        }
        drop(tasks);

        let _ = self.inner.events.send(StoreEvent::Loaded { counts });
        info!(
            scope = %scope,
            total = counts.total(),
            products = counts.products,
            customers = counts.customers,
            invoices = counts.invoices,
            "Business store ready"
        );
        Ok(counts)
    }

    /// Resolves once every write accepted before this call has reached the
    /// port or been abandoned.
    pub async fn flush(&self) -> StoreResult<()> {
        let queue = self.read_state().queue.clone();
        match queue {
            Some(queue) => queue.flush().await,
            None => Ok(()),
        }
    }

    /// Writes accepted but not yet persisted.
    pub fn pending_writes(&self) -> usize {
        self.read_state()
            .queue
            .as_ref()
            .map(WriteQueue::pending)
            .unwrap_or(0)
    }

    /// Stops the reconciler, drains queued writes and rejects further
    /// mutations. Idempotent.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let queue = {
            let mut state = self.write_state();
            if state.phase == StorePhase::Stopped {
                return Ok(());
            }
            state.phase = StorePhase::Stopped;
            state.queue.take()
        };

        let mut tasks = self.inner.tasks.lock().await;
        if let Some((handle, task)) = tasks.reconciler.take() {
            let _ = handle.shutdown().await;
            if let Err(e) = task.await {
                error!(?e, "Reconciler task failed");
            }
        }

        drop(queue);
        if let Some(task) = tasks.writer.take() {
            if let Err(e) = task.await {
                error!(?e, "Write worker task failed");
            }
        }

        info!(scope = %self.inner.scope, "Business store shut down");
        Ok(())
    }

    /// New receiver for store events. Only events sent after this call are
    /// delivered.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Applies a change made elsewhere, by id, without re-deriving anything
    /// and without writing it back.
    ///
    /// ## Returns
    /// `true` when the collections changed. A notification matching what is
    /// already held (including the echo of this store's own write) returns
    /// `false` and emits nothing.
    pub fn apply_remote(&self, change: RemoteChange) -> bool {
        let mut state = self.write_state();
        if state.phase != StorePhase::Ready {
            debug!(phase = ?state.phase, "Ignoring remote change outside Ready phase");
            return false;
        }

        let kind = change.kind();
        let id = change.id().to_string();
        let event = match change {
            RemoteChange::Insert { entity } | RemoteChange::Update { entity } => {
                if state.data.get(kind, &id).as_ref() == Some(&entity) {
                    return false;
                }
                let change = if state.data.upsert(entity) {
                    ChangeType::Updated
                } else {
                    ChangeType::Created
                };
                StoreEvent::remote(kind, id.clone(), change)
            }
            RemoteChange::Delete { .. } => {
                if !state.data.remove(kind, &id) {
                    return false;
                }
                StoreEvent::remote(kind, id.clone(), ChangeType::Deleted)
            }
        };
        drop(state);

        debug!(entity_type = %kind, entity_id = %id, "Applied remote change");
        let _ = self.inner.events.send(event);
        true
    }

    // =========================================================================
    // State Access
    // =========================================================================

    pub fn phase(&self) -> StorePhase {
        self.read_state().phase
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn settings(&self) -> &BusinessSettings {
        self.inner.config.settings()
    }

    pub fn counts(&self) -> EntityCounts {
        self.read_state().data.counts()
    }

    /// Immutable copy of every collection.
    pub fn snapshot(&self) -> BusinessData {
        self.read_state().data.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the current collections under the read lock.
    fn with_data<T>(&self, f: impl FnOnce(&BusinessData) -> T) -> T {
        f(&self.read_state().data)
    }

    /// Write lock for a mutation, or the lifecycle error.
    fn begin(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        let state = self.write_state();
        match state.phase {
            StorePhase::Ready => Ok(state),
            StorePhase::Loading => Err(StoreError::NotLoaded),
            StorePhase::Stopped => Err(StoreError::Stopped),
        }
    }

    /// Queues the batch's writes (still under the lock, to keep their order)
    /// then releases the lock and emits its events.
    fn commit(&self, state: RwLockWriteGuard<'_, State>, batch: ChangeBatch) {
        if let Some(queue) = &state.queue {
            for change in batch.writes {
                if let Err(e) = queue.enqueue(change) {
                    error!(?e, "Failed to queue write");
                }
            }
        }
        drop(state);

        for event in batch.events {
            let _ = self.inner.events.send(event);
        }
    }
}
