//! # bizbook-core: Pure Business Logic for BizBook
//!
//! The entity model and every derivation the Business Store relies on, as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BizBook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Presentation (external)                         │   │
//! │  │   Products ──► Customers ──► Invoices ──► Dashboard/Reports    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ mutate / query                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            bizbook-store (Business Store + Port)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ bizbook-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │  │  types  │ │  money  │ │ numbering │ │ invoice │ │analytics│ │   │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └─────────┘ └─────────┘ │   │
//! │  │  ┌───────────┐ ┌───────────┐ ┌─────────┐                        │   │
//! │  │  │ validation│ │ inventory │ │  query  │                        │   │
//! │  │  └───────────┘ └───────────┘ └─────────┘                        │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity model (Product, Invoice, Payment, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Field and entity rules
//! - [`numbering`] - Invoice number generation
//! - [`invoice`] - Invoice totals and payment derivations
//! - [`inventory`] - Stock movement arithmetic
//! - [`query`] - Search and filter helpers
//! - [`analytics`] - Dashboard and report folds
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: the current time is always a parameter
//! 2. **Integer Money**: all monetary values are minor units (i64)
//! 3. **Recompute, never patch**: derived fields are rebuilt from their sources
//!
//! ## Example Usage
//!
//! ```rust
//! use bizbook_core::money::Money;
//! use bizbook_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(2500);
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(1000));
//! assert_eq!(tax.cents(), 250);
//! assert_eq!((subtotal + tax).to_string(), "27.50");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod error;
pub mod inventory;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single invoice.
pub const MAX_INVOICE_ITEMS: usize = 100;

/// Maximum quantity on one invoice line or one stock movement.
///
/// Catches typos like 10000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

/// Maximum unit price, cost, discount, payment or expense amount, in minor
/// units (100 million major units).
///
/// With `MAX_ITEM_QUANTITY` and `MAX_INVOICE_ITEMS` this keeps every invoice
/// total well inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Maximum length of names, categories and similar free text.
pub const MAX_TEXT_LENGTH: usize = 200;

/// Generates a fresh entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_unique_uuid() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
