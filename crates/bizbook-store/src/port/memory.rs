//! # In-Memory Port
//!
//! Local-only Persistence Port keeping documents in a map per scope.
//!
//! Tests also use it as the fake backend:
//! ```text
//!   fail_next_writes(n)   next n writes fail with a retryable error
//!   reject_next_writes(n) next n writes fail permanently
//!   fail_load(err)        load_all returns err
//!   gate_loads()          load_all waits until the returned Notify fires
//!   inject_remote(..)     another device wrote: store it and notify feeds
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use bizbook_core::{BusinessData, Entity, EntityChange, EntityKind, RemoteChange, Scope};

use super::{PersistencePort, Subscription};
use crate::error::{PortError, PortResult};

#[derive(Debug, Default)]
struct MemoryState {
    scopes: HashMap<String, BusinessData>,
    applied: Vec<EntityChange>,
    write_failures: VecDeque<PortError>,
    load_failure: Option<PortError>,
    load_gate: Option<Arc<Notify>>,
    feeds: Vec<(String, mpsc::Sender<RemoteChange>)>,
}

/// Persistence Port backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryPort {
    state: Mutex<MemoryState>,
    realtime: bool,
    waiting_loads: AtomicUsize,
}

impl MemoryPort {
    /// Local-only: `subscribe` returns `None`.
    pub fn new() -> Self {
        MemoryPort::default()
    }

    /// With a change feed fed by [`MemoryPort::inject_remote`].
    pub fn realtime() -> Self {
        MemoryPort {
            realtime: true,
            ..MemoryPort::default()
        }
    }

    /// Pre-populates `scope`.
    pub fn with_data(self, scope: &Scope, data: BusinessData) -> Self {
        self.lock().scopes.insert(scope.as_str().to_string(), data);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_next_writes(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .write_failures
                .push_back(PortError::Unavailable("simulated outage".into()));
        }
    }

    pub fn reject_next_writes(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .write_failures
                .push_back(PortError::Rejected("simulated rejection".into()));
        }
    }

    pub fn fail_load(&self, error: PortError) {
        self.lock().load_failure = Some(error);
    }

    /// Holds every later `load_all` until the returned handle is notified,
    /// once per load.
    pub fn gate_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().load_gate = Some(gate.clone());
        gate
    }

    /// Loads currently held by [`MemoryPort::gate_loads`].
    pub fn waiting_loads(&self) -> usize {
        self.waiting_loads.load(Ordering::SeqCst)
    }

    /// Stored documents for `scope`.
    pub fn stored(&self, scope: &Scope) -> BusinessData {
        self.lock()
            .scopes
            .get(scope.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Every write that was applied, in arrival order.
    pub fn applied_writes(&self) -> Vec<EntityChange> {
        self.lock().applied.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().applied.len()
    }

    /// Records a change made by another writer and pushes it to every
    /// feed subscribed to `scope`.
    pub async fn inject_remote(&self, scope: &Scope, change: RemoteChange) {
        let feeds: Vec<mpsc::Sender<RemoteChange>> = {
            let mut state = self.lock();
            let data = state.scopes.entry(scope.as_str().to_string()).or_default();
            match &change {
                RemoteChange::Insert { entity } | RemoteChange::Update { entity } => {
                    apply_upsert(data, entity.clone());
                }
                RemoteChange::Delete { kind, id } => {
                    data.remove(*kind, id);
                }
            }
            state.feeds.retain(|(_, tx)| !tx.is_closed());
            state
                .feeds
                .iter()
                .filter(|(s, _)| s == scope.as_str())
                .map(|(_, tx)| tx.clone())
                .collect()
        };

        for feed in feeds {
            let _ = feed.send(change.clone()).await;
        }
    }
}

fn stored_updated_at(data: &BusinessData, kind: EntityKind, id: &str) -> Option<DateTime<Utc>> {
    match kind {
        EntityKind::Product => data.product(id).map(|e| e.updated_at),
        EntityKind::Customer => data.customer(id).map(|e| e.updated_at),
        EntityKind::Vendor => data.vendor(id).map(|e| e.updated_at),
        EntityKind::Invoice => data.invoice(id).map(|e| e.updated_at),
        EntityKind::Payment => data.payment(id).map(|e| e.updated_at),
        EntityKind::Expense => data.expense(id).map(|e| e.updated_at),
        EntityKind::StockMovement => data
            .stock_movements
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.created_at),
    }
}

/// Last-write-wins upsert. Returns false when a newer version is stored.
fn apply_upsert(data: &mut BusinessData, entity: Entity) -> bool {
    if let Some(stored) = stored_updated_at(data, entity.kind(), entity.id()) {
        if stored > entity.updated_at() {
            return false;
        }
    }
    data.upsert(entity);
    true
}

#[async_trait]
impl PersistencePort for MemoryPort {
    async fn load_all(&self, scope: &Scope) -> PortResult<Vec<Entity>> {
        let gate = self.lock().load_gate.clone();
        if let Some(gate) = gate {
            self.waiting_loads.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.waiting_loads.fetch_sub(1, Ordering::SeqCst);
        }

        let state = self.lock();
        if let Some(err) = &state.load_failure {
            return Err(err.clone());
        }
        Ok(state
            .scopes
            .get(scope.as_str())
            .cloned()
            .unwrap_or_default()
            .into_entities())
    }

    async fn write(&self, scope: &Scope, change: &EntityChange) -> PortResult<()> {
        let mut state = self.lock();
        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }

        let data = state.scopes.entry(scope.as_str().to_string()).or_default();
        match change {
            EntityChange::Upsert { entity } => {
                if !apply_upsert(data, entity.clone()) {
                    debug!(entity_type = %entity.kind(), entity_id = %entity.id(), "Skipped stale write");
                }
            }
            EntityChange::Delete { kind, id } => {
                data.remove(*kind, id);
            }
        }
        state.applied.push(change.clone());
        Ok(())
    }

    async fn subscribe(&self, scope: &Scope) -> PortResult<Option<Subscription>> {
        if !self.realtime {
            return Ok(None);
        }
        let (tx, subscription) = Subscription::channel();
        self.lock().feeds.push((scope.as_str().to_string(), tx));
        Ok(Some(subscription))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizbook_core::{NewCustomer, NewProduct};
    use chrono::Duration;

    fn scope() -> Scope {
        Scope::new("shop")
    }

    fn product(id: &str, name: &str, at: DateTime<Utc>) -> Entity {
        Entity::Product(
            NewProduct {
                name: name.into(),
                sku: "W-1".into(),
                category: "General".into(),
                ..Default::default()
            }
            .into_product(id.into(), &scope(), at),
        )
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let port = MemoryPort::new();
        let now = Utc::now();
        port.write(&scope(), &EntityChange::upsert(product("p1", "Widget", now)))
            .await
            .unwrap();

        let loaded = port.load_all(&scope()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "p1");
        assert!(port.load_all(&Scope::new("other")).await.unwrap().is_empty());
        assert!(port.subscribe(&scope()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_upsert_does_not_replace_newer() {
        let port = MemoryPort::new();
        let now = Utc::now();
        port.write(&scope(), &EntityChange::upsert(product("p1", "New", now)))
            .await
            .unwrap();
        port.write(
            &scope(),
            &EntityChange::upsert(product("p1", "Old", now - Duration::seconds(5))),
        )
        .await
        .unwrap();

        assert_eq!(port.stored(&scope()).products[0].name, "New");
        assert_eq!(port.write_count(), 2);
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let port = MemoryPort::new();
        port.fail_next_writes(1);
        port.reject_next_writes(1);
        let change = EntityChange::delete(EntityKind::Product, "p1");

        let first = port.write(&scope(), &change).await.unwrap_err();
        assert!(first.is_retryable());
        let second = port.write(&scope(), &change).await.unwrap_err();
        assert!(!second.is_retryable());
        assert!(port.write(&scope(), &change).await.is_ok());

        port.fail_load(PortError::Unavailable("down".into()));
        assert!(port.load_all(&scope()).await.is_err());
    }

    #[tokio::test]
    async fn test_inject_remote_reaches_subscribers() {
        let port = MemoryPort::realtime();
        let mut feed = port.subscribe(&scope()).await.unwrap().unwrap();

        let customer = Entity::Customer(
            NewCustomer {
                name: "Asha".into(),
                phone: "+1234567890".into(),
                ..Default::default()
            }
            .into_customer("c1".into(), &scope(), Utc::now()),
        );
        port.inject_remote(&scope(), RemoteChange::Insert { entity: customer })
            .await;

        let change = feed.recv().await.unwrap();
        assert_eq!(change.id(), "c1");
        assert_eq!(port.stored(&scope()).customers.len(), 1);
        assert_eq!(port.write_count(), 0);
    }
}
