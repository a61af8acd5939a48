//! # SQLite Port
//!
//! Durable Persistence Port over `bizbook-db`.
//!
//! ## Write Path
//! ```text
//! EntityChange::Upsert ──► EntityRecord { document: JSON, updated_at_ms, origin }
//!                              │
//!                              ▼
//!                      EntityRepository::upsert  (LWW + change_log row)
//!
//! EntityChange::Delete ──► EntityRepository::delete  (change_log row)
//! ```
//!
//! ## Change Feed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subscribe(scope)                                                       │
//! │     cursor = latest change_log seq                                      │
//! │     spawn poller ──┐                                                    │
//! │                    │ every poll_interval:                               │
//! │                    │   since(scope, cursor, exclude = own origin)       │
//! │                    │   insert/update ──► RemoteChange::Insert/Update    │
//! │                    │   delete        ──► RemoteChange::Delete           │
//! │                    │   cursor = last seq                                │
//! │                    └─► stops on cancel or when the subscriber is gone   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use bizbook_core::{Entity, EntityChange, RemoteChange, Scope};
use bizbook_db::{ChangeOp, ChangeRecord, Database, EntityRecord, WriteOutcome};

use super::{PersistencePort, Subscription};
use crate::error::{PortError, PortResult};

/// Persistence Port storing one JSON document per entity in SQLite.
#[derive(Debug, Clone)]
pub struct SqlitePort {
    db: Database,
    origin: String,
    poll_interval: Duration,
    batch_size: i64,
    retention: Option<Duration>,
}

impl SqlitePort {
    /// ## Arguments
    /// * `origin` - This device's id, stamped on every write
    pub fn new(db: Database, origin: impl Into<String>) -> Self {
        SqlitePort {
            db,
            origin: origin.into(),
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
            retention: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = i64::from(batch_size.max(1));
        self
    }

    /// Change-log rows older than `retention` are pruned on each load.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl SqlitePort {
    // The feed cursor starts at latest_seq after load, so older rows are
    // only needed by peers whose poller has fallen behind by `retention`.
    async fn prune_change_log(&self, scope: &Scope) {
        let Some(cutoff) = self
            .retention
            .and_then(|r| chrono::Duration::from_std(r).ok())
            .and_then(|r| Utc::now().checked_sub_signed(r))
        else {
            return;
        };

        match self.db.change_log().prune_before(scope.as_str(), cutoff).await {
            Ok(0) => {}
            Ok(pruned) => info!(scope = %scope, pruned, "Pruned change log"),
            Err(e) => warn!(scope = %scope, error = %e, "Change log prune failed"),
        }
    }
}

fn decode_record(record: &EntityRecord) -> PortResult<Entity> {
    let kind = record.kind()?;
    Entity::from_document(kind, &record.document).map_err(|e| {
        PortError::Corrupt(format!(
            "{} {}: {}",
            record.entity_type, record.entity_id, e
        ))
    })
}

fn to_remote_change(row: &ChangeRecord) -> PortResult<RemoteChange> {
    let kind = row.kind()?;
    let op = row.change_op()?;

    if op == ChangeOp::Delete {
        return Ok(RemoteChange::Delete {
            kind,
            id: row.entity_id.clone(),
        });
    }

    let document = row.document.as_deref().ok_or_else(|| {
        PortError::Corrupt(format!("change {} has no document", row.seq))
    })?;
    let entity = Entity::from_document(kind, document)
        .map_err(|e| PortError::Corrupt(format!("change {}: {}", row.seq, e)))?;

    Ok(match op {
        ChangeOp::Insert => RemoteChange::Insert { entity },
        _ => RemoteChange::Update { entity },
    })
}

#[async_trait]
impl PersistencePort for SqlitePort {
    async fn load_all(&self, scope: &Scope) -> PortResult<Vec<Entity>> {
        let records = self.db.entities().load_scope(scope.as_str()).await?;
        let entities = records
            .iter()
            .map(decode_record)
            .collect::<PortResult<Vec<_>>>()?;

        info!(scope = %scope, count = entities.len(), "Loaded entities from SQLite");
        self.prune_change_log(scope).await;
        Ok(entities)
    }

    async fn write(&self, scope: &Scope, change: &EntityChange) -> PortResult<()> {
        match change {
            EntityChange::Upsert { entity } => {
                let record = EntityRecord::new(
                    scope.as_str(),
                    entity.kind(),
                    entity.id(),
                    entity.to_document()?,
                    entity.updated_at().timestamp_millis(),
                    &self.origin,
                );
                let outcome = self.db.entities().upsert(&record).await?;
                if outcome == WriteOutcome::Stale {
                    debug!(
                        entity_type = %entity.kind(),
                        entity_id = %entity.id(),
                        "Newer version already stored"
                    );
                }
            }
            EntityChange::Delete { kind, id } => {
                let seq = self
                    .db
                    .entities()
                    .delete(scope.as_str(), *kind, id, &self.origin)
                    .await?;
                if seq.is_none() {
                    debug!(entity_type = %kind, entity_id = %id, "Delete of absent record");
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&self, scope: &Scope) -> PortResult<Option<Subscription>> {
        let cursor = self.db.change_log().latest_seq(scope.as_str()).await?;
        let (tx, subscription) = Subscription::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let poller = ChangeFeedPoller {
            db: self.db.clone(),
            scope: scope.clone(),
            origin: self.origin.clone(),
            cursor,
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
            tx,
        };
        tokio::spawn(poller.run(cancel_rx));

        info!(scope = %scope, cursor, origin = %self.origin, "Change feed subscribed");
        Ok(Some(subscription.with_cancel(cancel_tx)))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// =============================================================================
// Change Feed Poller
// =============================================================================

struct ChangeFeedPoller {
    db: Database,
    scope: Scope,
    origin: String,
    cursor: i64,
    poll_interval: Duration,
    batch_size: i64,
    tx: mpsc::Sender<RemoteChange>,
}

impl ChangeFeedPoller {
    async fn run(mut self, mut cancel: oneshot::Receiver<()>) {
        debug!(scope = %self.scope, "Change feed poller starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll().await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => warn!(?e, scope = %self.scope, "Change feed poll failed"),
                    }
                }

                _ = &mut cancel => break,
            }
        }

        debug!(scope = %self.scope, cursor = self.cursor, "Change feed poller stopped");
    }

    /// Forwards one batch. Returns false once the subscriber is gone.
    async fn poll(&mut self) -> PortResult<bool> {
        let rows = self
            .db
            .change_log()
            .since(
                self.scope.as_str(),
                self.cursor,
                Some(&self.origin),
                self.batch_size,
            )
            .await?;

        for row in rows {
            // Undecodable rows are skipped, never retried.
            self.cursor = row.seq;
            let change = match to_remote_change(&row) {
                Ok(change) => change,
                Err(e) => {
                    warn!(?e, seq = row.seq, "Skipping undecodable change");
                    continue;
                }
            };
            if self.tx.send(change).await.is_err() {
                return Ok(false);
            }
        }

        Ok(!self.tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizbook_core::{EntityKind, NewProduct};
    use bizbook_db::DbConfig;
    use chrono::Duration as ChronoDuration;

    fn scope() -> Scope {
        Scope::new("shop")
    }

    fn product(name: &str, at: chrono::DateTime<Utc>) -> Entity {
        Entity::Product(
            NewProduct {
                name: name.into(),
                sku: "W-1".into(),
                category: "General".into(),
                quantity: 5,
                ..Default::default()
            }
            .into_product("p1".into(), &scope(), at),
        )
    }

    async fn port(origin: &str) -> SqlitePort {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SqlitePort::new(db, origin).with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_round_trip_and_lww() {
        let port = port("device-a").await;
        let now = Utc::now();

        port.write(&scope(), &EntityChange::upsert(product("Widget", now)))
            .await
            .unwrap();
        port.write(
            &scope(),
            &EntityChange::upsert(product("Stale", now - ChronoDuration::seconds(1))),
        )
        .await
        .unwrap();

        let loaded = port.load_all(&scope()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        match &loaded[0] {
            Entity::Product(p) => assert_eq!(p.name, "Widget"),
            other => panic!("unexpected entity {:?}", other),
        }

        port.write(&scope(), &EntityChange::delete(EntityKind::Product, "p1"))
            .await
            .unwrap();
        assert!(port.load_all(&scope()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_skips_own_writes() {
        let local = port("device-a").await;
        let remote = SqlitePort::new(local.database().clone(), "device-b");

        let mut feed = local.subscribe(&scope()).await.unwrap().unwrap();

        local
            .write(&scope(), &EntityChange::upsert(product("Mine", Utc::now())))
            .await
            .unwrap();
        remote
            .write(&scope(), &EntityChange::delete(EntityKind::Product, "p1"))
            .await
            .unwrap();

        let change = tokio::time::timeout(Duration::from_secs(2), feed.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            change,
            RemoteChange::Delete {
                kind: EntityKind::Product,
                id: "p1".into()
            }
        );
        feed.cancel();
    }

    #[tokio::test]
    async fn test_load_prunes_expired_change_log() {
        let kept = port("device-a").await;
        kept.write(&scope(), &EntityChange::upsert(product("Widget", Utc::now())))
            .await
            .unwrap();

        kept.load_all(&scope()).await.unwrap();
        let log = kept.database().change_log();
        assert_eq!(log.since("shop", 0, None, 10).await.unwrap().len(), 1);

        let pruning = SqlitePort::new(kept.database().clone(), "device-a")
            .with_retention(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let loaded = pruning.load_all(&scope()).await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(log.since("shop", 0, None, 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_change_is_reported() {
        let row = ChangeRecord {
            seq: 7,
            scope: "shop".into(),
            entity_type: "product".into(),
            entity_id: "p1".into(),
            op: "update".into(),
            document: None,
            origin: "device-b".into(),
            recorded_at: Utc::now(),
        };
        assert!(matches!(to_remote_change(&row), Err(PortError::Corrupt(_))));
    }
}
