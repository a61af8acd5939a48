//! # Change Log Repository
//!
//! Append-only feed of accepted writes, used as the row-level change
//! notification channel between devices sharing one database.
//!
//! ```text
//!   device A write ──► entity_records + change_log (seq 41, origin A)
//!                                           │
//!   device B poller: since(scope, 40, exclude B) ──► [seq 41] ──► reconcile
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use bizbook_core::EntityKind;

use crate::error::{DbError, DbResult};

/// Row-level operation recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(ChangeOp::Insert),
            "update" => Ok(ChangeOp::Update),
            "delete" => Ok(ChangeOp::Delete),
            other => Err(DbError::Corrupt(format!("unknown change op '{other}'"))),
        }
    }
}

/// One change-log row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ChangeRecord {
    pub seq: i64,
    pub scope: String,
    pub entity_type: String,
    pub entity_id: String,
    pub op: String,
    /// `None` for deletes.
    pub document: Option<String>,
    pub origin: String,
    pub recorded_at: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn kind(&self) -> DbResult<EntityKind> {
        self.entity_type
            .parse()
            .map_err(|e: bizbook_core::ValidationError| DbError::Corrupt(e.to_string()))
    }

    pub fn change_op(&self) -> DbResult<ChangeOp> {
        self.op.parse()
    }
}

/// Appends one row on an open connection or transaction. Returns its seq.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    scope: &str,
    entity_type: &str,
    entity_id: &str,
    op: ChangeOp,
    document: Option<&str>,
    origin: &str,
) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO change_log (
            scope, entity_type, entity_id, op, document, origin, recorded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(scope)
    .bind(entity_type)
    .bind(entity_id)
    .bind(op.as_str())
    .bind(document)
    .bind(origin)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Repository for change-log reads and maintenance.
#[derive(Debug, Clone)]
pub struct ChangeLogRepository {
    pool: SqlitePool,
}

impl ChangeLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ChangeLogRepository { pool }
    }

    /// Changes in `scope` after `after_seq`, oldest first.
    ///
    /// ## Arguments
    /// * `exclude_origin` - Skip rows written by this origin (the caller's own
    ///   writes)
    /// * `limit` - Maximum rows to return
    pub async fn since(
        &self,
        scope: &str,
        after_seq: i64,
        exclude_origin: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<ChangeRecord>> {
        let rows = sqlx::query_as::<_, ChangeRecord>(
            r#"
            SELECT seq, scope, entity_type, entity_id, op, document, origin, recorded_at
            FROM change_log
            WHERE scope = ?1
              AND seq > ?2
              AND (?3 IS NULL OR origin <> ?3)
            ORDER BY seq ASC
            LIMIT ?4
            "#,
        )
        .bind(scope)
        .bind(after_seq)
        .bind(exclude_origin)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(scope = %scope, after_seq, count = rows.len(), "Fetched change log");
        Ok(rows)
    }

    /// Highest seq in `scope`, or 0 when the log is empty.
    pub async fn latest_seq(&self, scope: &str) -> DbResult<i64> {
        let seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM change_log WHERE scope = ?1")
                .bind(scope)
                .fetch_one(&self.pool)
                .await?;
        Ok(seq)
    }

    /// Deletes rows in `scope` recorded before `cutoff`.
    ///
    /// Only safe for rows no live session still needs: sessions reload full
    /// documents on load and read the feed from `latest_seq` onwards.
    ///
    /// ## Returns
    /// Number of deleted rows.
    pub async fn prune_before(&self, scope: &str, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM change_log WHERE scope = ?1 AND recorded_at < ?2")
            .bind(scope)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        debug!(scope = %scope, pruned = result.rows_affected(), "Pruned change log");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn append_row(db: &Database, scope: &str, id: &str, origin: &str) -> i64 {
        let mut conn = db.pool().acquire().await.unwrap();
        append(&mut conn, scope, "product", id, ChangeOp::Insert, Some("{}"), origin)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_since_filters_scope_cursor_and_origin() {
        let db = db().await;
        let s1 = append_row(&db, "shop", "p1", "device-a").await;
        let _ = append_row(&db, "shop", "p2", "device-b").await;
        let _ = append_row(&db, "other", "p3", "device-b").await;
        let s4 = append_row(&db, "shop", "p4", "device-b").await;

        let log = db.change_log();
        let all = log.since("shop", 0, None, 100).await.unwrap();
        assert_eq!(all.len(), 3);

        let foreign = log.since("shop", 0, Some("device-a"), 100).await.unwrap();
        let ids: Vec<&str> = foreign.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p4"]);

        let after = log.since("shop", s1, None, 1).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].entity_id, "p2");
        assert_eq!(after[0].change_op().unwrap(), ChangeOp::Insert);
        assert_eq!(after[0].kind().unwrap(), EntityKind::Product);

        assert_eq!(log.latest_seq("shop").await.unwrap(), s4);
        assert_eq!(log.latest_seq("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prune_before_cutoff() {
        let db = db().await;
        append_row(&db, "shop", "p1", "a").await;
        let s2 = append_row(&db, "shop", "p2", "a").await;
        append_row(&db, "other", "p3", "a").await;

        let log = db.change_log();
        let hour = chrono::Duration::hours(1);
        assert_eq!(log.prune_before("shop", Utc::now() - hour).await.unwrap(), 0);
        assert_eq!(log.since("shop", 0, None, 10).await.unwrap().len(), 2);

        assert_eq!(log.prune_before("shop", Utc::now() + hour).await.unwrap(), 2);
        assert!(log.since("shop", 0, None, 10).await.unwrap().is_empty());
        assert_eq!(log.since("other", 0, None, 10).await.unwrap().len(), 1);

        // Pruning never rewinds the sequence.
        let s4 = append_row(&db, "shop", "p4", "a").await;
        assert!(s4 > s2);
    }

    #[test]
    fn test_change_op_parse() {
        assert_eq!("delete".parse::<ChangeOp>().unwrap(), ChangeOp::Delete);
        assert!("upsert".parse::<ChangeOp>().is_err());
    }
}
