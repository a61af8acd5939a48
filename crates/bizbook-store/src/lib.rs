//! # bizbook-store: Business Store for BizBook
//!
//! The single in-process owner of a small business's products, customers,
//! vendors, invoices, payments, expenses and stock movements, kept in sync
//! with durable storage through a Persistence Port.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Business Store Runtime                           │
//! │                                                                         │
//! │  caller ──► BusinessStore::add_invoice(..)                              │
//! │                 │  validate, mutate, re-derive   (sync, one write lock) │
//! │                 │                                                       │
//! │                 ├──► StoreEvent::Changed ──► subscribe_events()         │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌────────────────────────┐        ┌────────────────────────────────┐  │
//! │  │ WriteWorker            │        │ Reconciler                     │  │
//! │  │  FIFO, retry/backoff   │        │  remote insert/update/delete   │  │
//! │  │  PersistenceFailed     │        │  applied by id, no write back  │  │
//! │  └───────────┬────────────┘        └───────────────▲────────────────┘  │
//! │              │ write(scope, change)                │ Subscription      │
//! │              ▼                                     │                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ PersistencePort:  MemoryPort  |  SqlitePort (bizbook-db)         │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] - `BusinessStore` lifecycle, mutations, queries and reports
//! - [`port`] - `PersistencePort` trait, `MemoryPort`, `SqlitePort`
//! - [`writer`] - Ordered write queue with retry
//! - [`reconcile`] - Change-feed application
//! - [`events`] - Observer notifications
//! - [`config`] - TOML + environment configuration
//! - [`seed`] - Sample business data
//! - [`error`] - Store and port error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bizbook_store::{BusinessStore, MemoryPort, StoreConfig};
//!
//! let store = BusinessStore::new(Arc::new(MemoryPort::new()), StoreConfig::default());
//! store.load().await?;
//!
//! let customer = store.add_customer(new_customer)?;
//! let invoice = store.add_invoice(new_invoice)?;
//! store.flush().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod port;
pub mod reconcile;
pub mod seed;
pub mod store;
pub mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::StoreConfig;
pub use error::{PortError, PortResult, StoreError, StoreResult};
pub use events::{ChangeOrigin, ChangeType, StoreEvent};
pub use port::{MemoryPort, PersistencePort, SqlitePort, Subscription};
pub use store::{BusinessStore, StorePhase, WeakBusinessStore};
pub use writer::{RetryPolicy, WriteQueue};
