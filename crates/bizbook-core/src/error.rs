//! # Error Types
//!
//! Domain-specific error types for bizbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bizbook-core errors (this file)                                       │
//! │  ├── CoreError        - Mutation failures (NotFound, integrity guards) │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bizbook-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bizbook-store errors (separate crate)                                 │
//! │  ├── PortError        - Persistence Port failures (async side channel) │
//! │  └── StoreError       - What callers of the Business Store see         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → Presentation         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::EntityKind;

// =============================================================================
// Core Error
// =============================================================================

/// Errors returned synchronously by mutation operations.
///
/// None of these leave partial state behind: every check runs before the
/// in-memory collections are touched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced entity is not in the current collection.
    ///
    /// ## When This Occurs
    /// - Update/delete target id is unknown
    /// - A payment references an unknown invoice
    /// - A stock movement or invoice line references an unknown product
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A delete was blocked by dependent entities.
    ///
    /// ## When This Occurs
    /// - Deleting a customer that still owns invoices
    /// - Deleting a vendor that is referenced by expenses
    ///
    /// ## User Workflow
    /// ```text
    /// Delete Customer "John Smith"
    ///      │
    ///      ▼
    /// Check invoices: 2 found
    ///      │
    ///      ▼
    /// ReferentialIntegrityViolation { kind: Customer, dependents: 2, .. }
    ///      │
    ///      ▼
    /// UI shows: "Delete the customer's 2 invoices first"
    /// ```
    #[error("cannot delete {kind} {id}: referenced by {dependents} {dependent_kind} record(s)")]
    ReferentialIntegrityViolation {
        kind: EntityKind,
        id: String,
        dependent_kind: EntityKind,
        dependents: usize,
    },

    /// The operation is not allowed in the entity's current state.
    ///
    /// ## When This Occurs
    /// - Recording a payment on a cancelled invoice
    /// - Changing the status of a completed or failed payment
    #[error("{kind} {id} is {state}: {reason}")]
    InvalidState {
        kind: EntityKind,
        id: String,
        state: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity kind and ID.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., malformed email, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ReferentialIntegrityViolation {
            kind: EntityKind::Customer,
            id: "c-1".to_string(),
            dependent_kind: EntityKind::Invoice,
            dependents: 2,
        };
        assert_eq!(
            err.to_string(),
            "cannot delete customer c-1: referenced by 2 invoice record(s)"
        );

        let err = CoreError::not_found(EntityKind::Product, "p-9");
        assert_eq!(err.to_string(), "product not found: p-9");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::Negative {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must not be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
