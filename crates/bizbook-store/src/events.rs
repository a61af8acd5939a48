//! # Store Events
//!
//! Observer contract between the store and whatever renders it.
//!
//! ```text
//!   load()              ──► Loaded { counts }
//!   add/update/delete   ──► Changed { origin: Local }
//!   reconciled change   ──► Changed { origin: Remote }
//!   write attempt fails ──► PersistenceFailed { attempt, will_retry }
//! ```
//!
//! Events go out on a `tokio::sync::broadcast` channel. A receiver that
//! falls behind by more than the configured capacity sees `Lagged` and
//! should re-read the state through the store's queries.

use serde::Serialize;

use bizbook_core::{EntityCounts, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// A mutation call on this store.
    Local,
    /// The Persistence Port's change feed.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The initial load finished (after seeding, if it ran).
    Loaded { counts: EntityCounts },

    Changed {
        kind: EntityKind,
        id: String,
        change: ChangeType,
        origin: ChangeOrigin,
    },

    /// A write did not reach the port. In-memory state is unaffected.
    ///
    /// ## When This Occurs
    /// - The backend is offline or busy (`will_retry` until retries run out)
    /// - The backend rejected the document (`will_retry: false`)
    PersistenceFailed {
        kind: EntityKind,
        id: String,
        attempt: u32,
        error: String,
        will_retry: bool,
    },
}

impl StoreEvent {
    pub fn local(kind: EntityKind, id: impl Into<String>, change: ChangeType) -> Self {
        StoreEvent::Changed {
            kind,
            id: id.into(),
            change,
            origin: ChangeOrigin::Local,
        }
    }

    pub fn remote(kind: EntityKind, id: impl Into<String>, change: ChangeType) -> Self {
        StoreEvent::Changed {
            kind,
            id: id.into(),
            change,
            origin: ChangeOrigin::Remote,
        }
    }
}
