//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqlitePort (bizbook-store)                                            │
//! │       │                                                                 │
//! │       │  db.entities().upsert(&record)                                 │
//! │       ▼                                                                 │
//! │  EntityRepository                                                      │
//! │  ├── load_scope(&self, scope)                                          │
//! │  ├── upsert(&self, record)   ─┐                                        │
//! │  └── delete(&self, ...)      ─┤ same transaction                       │
//! │                               ▼                                         │
//! │  ChangeLogRepository ── append / since / latest_seq / prune_before     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`EntityRepository`] - One JSON document per entity, last-write-wins
//! - [`ChangeLogRepository`] - Ordered change feed

pub mod change_log;
pub mod entity;

pub use change_log::{ChangeLogRepository, ChangeOp, ChangeRecord};
pub use entity::{EntityRecord, EntityRepository, WriteOutcome};
