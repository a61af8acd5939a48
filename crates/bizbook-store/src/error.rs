//! # Store Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Store Errors                                    │
//! │                                                                         │
//! │  SYNCHRONOUS (returned from the mutation call)                         │
//! │  ├── Core(NotFound)                      ← unknown id                  │
//! │  ├── Core(ReferentialIntegrityViolation) ← delete blocked              │
//! │  ├── Core(Validation)                    ← rejected before any write   │
//! │  └── NotLoaded / AlreadyLoaded / Stopped ← lifecycle misuse            │
//! │                                                                         │
//! │  ASYNCHRONOUS (StoreEvent::PersistenceFailed, never returned)          │
//! │  └── PortError                           ← retried with backoff        │
//! │                                                                         │
//! │  STARTUP                                                               │
//! │  ├── Port(..)                            ← initial load failed         │
//! │  └── InvalidConfig / ConfigLoadFailed    ← bad bizbook.toml            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use thiserror::Error;

use bizbook_core::{CoreError, ValidationError};
use bizbook_db::DbError;

// =============================================================================
// Port Error
// =============================================================================

/// Failure reported by a Persistence Port realization.
#[derive(Debug, Clone, Error)]
pub enum PortError {
    /// The backend could not be reached or is temporarily busy.
    #[error("Persistence backend unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the request but the storage operation failed.
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// An entity could not be encoded for storage.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A stored document could not be decoded.
    ///
    /// ## When This Occurs
    /// - A row was written by a newer schema
    /// - The document was edited outside the application
    #[error("Corrupt stored record: {0}")]
    Corrupt(String),

    /// The backend refused the write outright.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl PortError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortError::Unavailable(_) | PortError::Storage(_))
    }
}

impl From<DbError> for PortError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return PortError::Unavailable(err.to_string());
        }
        match err {
            DbError::Corrupt(msg) => PortError::Corrupt(msg),
            DbError::UniqueViolation { .. } => PortError::Rejected(err.to_string()),
            other => PortError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::Serialization(err.to_string())
    }
}

/// Result type for port operations.
pub type PortResult<T> = Result<T, PortError>;

// =============================================================================
// Store Error
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// A mutation arrived before the initial load finished.
    #[error("Business store is not loaded yet")]
    NotLoaded,

    /// `load()` was called a second time.
    #[error("Business store is already loaded")]
    AlreadyLoaded,

    /// The store was shut down.
    #[error("Business store has been shut down")]
    Stopped,

    // =========================================================================
    // Business Errors
    // =========================================================================
    /// NotFound, ReferentialIntegrityViolation, InvalidState or Validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// The initial load from the Persistence Port failed.
    #[error("Persistence failure: {0}")]
    Port(#[from] PortError),

    /// Internal channel closed unexpectedly.
    #[error("Channel error: {0}")]
    ChannelError(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::NotFound { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::Validation(_)))
    }

    pub fn is_referential_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Core(CoreError::ReferentialIntegrityViolation { .. })
        )
    }

    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidConfig(_)
                | StoreError::ConfigLoadFailed(_)
                | StoreError::ConfigSaveFailed(_)
                | StoreError::ConfigNotFound(_)
        )
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ConfigSaveFailed(format!("TOML serialize error: {}", err))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::Port(err.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
