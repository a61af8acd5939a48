//! # bizbook-db: Database Layer for BizBook
//!
//! SQLite storage for the durable Persistence Port realization.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BizBook Data Flow                                │
//! │                                                                         │
//! │  BusinessStore write worker                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqlitePort (bizbook-store)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bizbook-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │◄───│ EntityRepository   │  │ (embedded) │  │   │
//! │  │   │  SqlitePool   │    │ ChangeLogRepository│  │ 001_*.sql  │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bizbook_db::{Database, DbConfig, EntityRecord};
//!
//! let db = Database::new(DbConfig::new("bizbook.db")).await?;
//! let rows = db.entities().load_scope("owner-1").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    ChangeLogRepository, ChangeOp, ChangeRecord, EntityRecord, EntityRepository, WriteOutcome,
};
