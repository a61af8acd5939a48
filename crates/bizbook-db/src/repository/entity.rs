//! # Entity Repository
//!
//! One JSON document row per entity, keyed by `(scope, entity_type, entity_id)`.
//!
//! ## Last-Write-Wins
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION (upsert)                           │
//! │                                                                         │
//! │  1. SELECT updated_at_ms of the stored row                             │
//! │  2. stored > incoming?  ──► Stale (nothing written, nothing logged)    │
//! │  3. INSERT ... ON CONFLICT DO UPDATE                                   │
//! │  4. INSERT INTO change_log (insert | update)                           │
//! │                                                                         │
//! │  COMMIT ← row and log entry land together or not at all                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Equal timestamps overwrite, so replaying the same write is harmless.

use sqlx::SqlitePool;
use tracing::debug;

use bizbook_core::EntityKind;

use super::change_log::{self, ChangeOp};
use crate::error::{DbError, DbResult};

/// A stored entity document.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EntityRecord {
    pub scope: String,
    pub entity_type: String,
    pub entity_id: String,
    pub document: String,
    pub updated_at_ms: i64,
    pub origin: String,
}

impl EntityRecord {
    pub fn new(
        scope: impl Into<String>,
        kind: EntityKind,
        entity_id: impl Into<String>,
        document: impl Into<String>,
        updated_at_ms: i64,
        origin: impl Into<String>,
    ) -> Self {
        EntityRecord {
            scope: scope.into(),
            entity_type: kind.as_str().to_string(),
            entity_id: entity_id.into(),
            document: document.into(),
            updated_at_ms,
            origin: origin.into(),
        }
    }

    pub fn kind(&self) -> DbResult<EntityKind> {
        self.entity_type
            .parse()
            .map_err(|e: bizbook_core::ValidationError| DbError::Corrupt(e.to_string()))
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted { seq: i64 },
    Updated { seq: i64 },
    /// A newer version was already stored.
    Stale,
}

/// Repository for entity documents.
#[derive(Debug, Clone)]
pub struct EntityRepository {
    pool: SqlitePool,
}

impl EntityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EntityRepository { pool }
    }

    /// All documents in `scope`, in first-insertion order.
    pub async fn load_scope(&self, scope: &str) -> DbResult<Vec<EntityRecord>> {
        let records = sqlx::query_as::<_, EntityRecord>(
            r#"
            SELECT scope, entity_type, entity_id, document, updated_at_ms, origin
            FROM entity_records
            WHERE scope = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        debug!(scope = %scope, count = records.len(), "Loaded entity records");
        Ok(records)
    }

    /// Inserts or replaces a document unless a newer version is stored, and
    /// logs the change in the same transaction.
    pub async fn upsert(&self, record: &EntityRecord) -> DbResult<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT updated_at_ms FROM entity_records
            WHERE scope = ?1 AND entity_type = ?2 AND entity_id = ?3
            "#,
        )
        .bind(&record.scope)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(stored_ms) = stored {
            if stored_ms > record.updated_at_ms {
                tx.rollback().await?;
                debug!(
                    entity_type = %record.entity_type,
                    entity_id = %record.entity_id,
                    stored_ms,
                    incoming_ms = record.updated_at_ms,
                    "Skipped stale write"
                );
                return Ok(WriteOutcome::Stale);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO entity_records (
                scope, entity_type, entity_id, document, updated_at_ms, origin
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (scope, entity_type, entity_id) DO UPDATE SET
                document = excluded.document,
                updated_at_ms = excluded.updated_at_ms,
                origin = excluded.origin
            "#,
        )
        .bind(&record.scope)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.document)
        .bind(record.updated_at_ms)
        .bind(&record.origin)
        .execute(&mut *tx)
        .await?;

        let op = if stored.is_some() {
            ChangeOp::Update
        } else {
            ChangeOp::Insert
        };
        let seq = change_log::append(
            &mut tx,
            &record.scope,
            &record.entity_type,
            &record.entity_id,
            op,
            Some(&record.document),
            &record.origin,
        )
        .await?;

        tx.commit().await?;

        debug!(
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            op = %op,
            seq,
            "Upserted entity record"
        );

        Ok(match op {
            ChangeOp::Insert => WriteOutcome::Inserted { seq },
            _ => WriteOutcome::Updated { seq },
        })
    }

    /// Removes a document and logs the delete.
    ///
    /// ## Returns
    /// The change-log seq, or `None` when nothing was stored under that key.
    pub async fn delete(
        &self,
        scope: &str,
        kind: EntityKind,
        entity_id: &str,
        origin: &str,
    ) -> DbResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM entity_records WHERE scope = ?1 AND entity_type = ?2 AND entity_id = ?3",
        )
        .bind(scope)
        .bind(kind.as_str())
        .bind(entity_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let seq = change_log::append(
            &mut tx,
            scope,
            kind.as_str(),
            entity_id,
            ChangeOp::Delete,
            None,
            origin,
        )
        .await?;

        tx.commit().await?;

        debug!(entity_type = %kind, entity_id = %entity_id, seq, "Deleted entity record");
        Ok(Some(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn record(id: &str, doc: &str, ms: i64) -> EntityRecord {
        EntityRecord::new("shop", EntityKind::Product, id, doc, ms, "device-a")
    }

    #[tokio::test]
    async fn test_upsert_insert_then_update() {
        let db = db().await;
        let repo = db.entities();

        let first = repo.upsert(&record("p1", r#"{"v":1}"#, 100)).await.unwrap();
        assert!(matches!(first, WriteOutcome::Inserted { .. }));

        let second = repo.upsert(&record("p1", r#"{"v":2}"#, 200)).await.unwrap();
        assert!(matches!(second, WriteOutcome::Updated { .. }));

        let stored = repo.load_scope("shop").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].document, r#"{"v":2}"#);
        assert_eq!(stored[0].kind().unwrap(), EntityKind::Product);

        let log = db.change_log().since("shop", 0, None, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].change_op().unwrap(), ChangeOp::Update);
    }

    #[tokio::test]
    async fn test_older_write_is_stale() {
        let db = db().await;
        let repo = db.entities();

        repo.upsert(&record("p1", "new", 200)).await.unwrap();
        let outcome = repo.upsert(&record("p1", "old", 100)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Stale);

        let stored = repo.load_scope("shop").await.unwrap();
        assert_eq!(stored[0].document, "new");
        assert_eq!(db.change_log().latest_seq("shop").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_scope_keeps_insertion_order() {
        let db = db().await;
        let repo = db.entities();

        repo.upsert(&record("b", "{}", 1)).await.unwrap();
        repo.upsert(&record("a", "{}", 1)).await.unwrap();
        repo.upsert(&record("b", "{}", 2)).await.unwrap();
        repo.upsert(&EntityRecord::new("elsewhere", EntityKind::Product, "z", "{}", 1, "x"))
            .await
            .unwrap();

        let ids: Vec<String> = repo
            .load_scope("shop")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.entity_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = db().await;
        let repo = db.entities();

        repo.upsert(&record("p1", "{}", 1)).await.unwrap();
        let seq = repo
            .delete("shop", EntityKind::Product, "p1", "device-a")
            .await
            .unwrap();
        assert!(seq.is_some());
        assert!(repo.load_scope("shop").await.unwrap().is_empty());

        let again = repo
            .delete("shop", EntityKind::Product, "p1", "device-a")
            .await
            .unwrap();
        assert!(again.is_none());

        let log = db.change_log().since("shop", 0, None, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].change_op().unwrap(), ChangeOp::Delete);
        assert!(log[1].document.is_none());
    }
}
