//! # Domain Types
//!
//! The BizBook entity model. Plain data, no persistence and no clock access.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  invoice_number │   │  invoice_id (FK)│       │
//! │  │  quantity       │   │  items[]        │   │  amount_cents   │       │
//! │  │  price_cents    │   │  payment_status │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Customer      │   │    Vendor       │   │    Expense      │       │
//! │  │  outstanding    │   │  payment terms  │   │  vendor_id? (FK)│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────────────────────────┐     │
//! │  │ StockMovement   │   │ Entity / EntityKind / EntityChange /    │     │
//! │  │  product_id(FK) │   │ RemoteChange / BusinessData             │     │
//! │  └─────────────────┘   └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for references between entities
//! - Business ID: (sku, invoice_number) - human-readable, unique per owner
//!
//! ## Ownership
//! Every entity carries `owner_id`, the [`Scope`] it was created under.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

mod entity;
mod expense;
mod invoice;
mod party;
mod product;
mod profile;

pub use entity::{BusinessData, Entity, EntityChange, EntityCounts, EntityKind, RemoteChange};
pub use expense::{Expense, ExpensePatch, NewExpense};
pub use invoice::{
    Invoice, InvoiceItem, InvoiceKind, InvoicePatch, InvoiceStatus, NewInvoice, NewInvoiceItem,
    NewPayment, Payment, PaymentMethod, PaymentStatus, TransactionStatus,
};
pub use party::{Customer, CustomerPatch, CustomerTier, NewCustomer, NewVendor, Vendor, VendorPatch};
pub use product::{
    MovementKind, NewProduct, NewStockMovement, Product, ProductPatch, ProductUnit, StockMovement,
};
pub use profile::{BusinessProfile, BusinessSettings, NumberingMode};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (the default invoice rate), 1800 bps = 18% GST slab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Scope & Actor
// =============================================================================

/// The owning business/user boundary entities are partitioned under.
///
/// Opaque to the store: it is tagged onto every created entity as
/// `owner_id` and handed to the Persistence Port on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope(String);

impl Scope {
    pub fn new(owner: impl Into<String>) -> Self {
        Scope(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of the signed-in actor. Authorization is not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Owner,
    Staff,
}

/// The current actor as supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: ActorRole) -> Self {
        Actor {
            id: id.into(),
            display_name: display_name.into(),
            role,
        }
    }

    /// The scope this actor's entities are owned by.
    pub fn scope(&self) -> Scope {
        Scope::new(self.id.clone())
    }
}

// =============================================================================
// Patch Helpers
// =============================================================================

/// Applies a patch value to an optional text field.
///
/// `None` leaves the field alone, `Some("")` (after trimming) clears it.
pub(crate) fn merge_optional_text(target: &mut Option<String>, patch: &Option<String>) {
    if let Some(value) = patch {
        let value = value.trim();
        *target = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
    }
}

pub(crate) fn merge<T: Clone>(target: &mut T, patch: &Option<T>) {
    if let Some(value) = patch {
        *target = value.clone();
    }
}

/// Trims optional text and drops it entirely when blank.
pub(crate) fn clean_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_optional_text() {
        let mut field = Some("old".to_string());
        merge_optional_text(&mut field, &None);
        assert_eq!(field.as_deref(), Some("old"));

        merge_optional_text(&mut field, &Some(" new ".to_string()));
        assert_eq!(field.as_deref(), Some("new"));

        merge_optional_text(&mut field, &Some("  ".to_string()));
        assert_eq!(field, None);
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert!((rate.percentage() - 10.0).abs() < 0.001);
        assert_eq!(TaxRate::default(), TaxRate::zero());
    }

    #[test]
    fn test_actor_scope() {
        let actor = Actor::new("owner-1", "Asha", ActorRole::Owner);
        assert_eq!(actor.scope().as_str(), "owner-1");
        assert_eq!(actor.scope().to_string(), "owner-1");
    }
}
