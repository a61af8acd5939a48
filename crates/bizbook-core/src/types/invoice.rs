//! Invoices, their line items, and the payments recorded against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Enums
// =============================================================================

/// Whether the invoice records a sale or a customer return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    #[default]
    Sale,
    Return,
}

/// Lifecycle status of an invoice.
///
/// ```text
///   Draft ──► Sent ──► Paid
///     │        │
///     └────────┴──► Cancelled
/// ```
/// `Sent` is the finalized state. `Paid` is entered automatically once the
/// payment status reaches `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Cancelled,
}

/// Derived from paid amount versus total. Never set by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing paid yet.
    #[default]
    Pending,
    /// `0 < paid < total`.
    Partial,
    /// `paid >= total`.
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Upi,
    Cheque,
}

/// Settlement status of a payment. Only `Completed` counts toward the
/// invoice's paid amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Completed,
    Pending,
    Failed,
}

// =============================================================================
// Invoice Item
// =============================================================================

/// A line on an invoice.
/// Uses the snapshot pattern: name and SKU are frozen at creation time and
/// are not resynced when the product is renamed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceItem {
    pub product_id: String,
    /// Product name at time of invoicing (frozen).
    pub product_name: String,
    /// SKU at time of invoicing (frozen).
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Line-specific rate; the invoice rate applies when unset.
    pub tax_rate_bps: Option<u32>,
    /// `quantity × unit_price`, before tax and discount.
    pub line_total_cents: i64,
    pub tax_cents: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Line input for creating or re-itemising an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoiceItem {
    pub product_id: String,
    pub quantity: i64,
    /// Defaults to the product's current price.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
    /// Defaults to the product's own rate, if any.
    #[serde(default)]
    pub tax_rate_bps: Option<u32>,
}

impl NewInvoiceItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        NewInvoiceItem {
            product_id: product_id.into(),
            quantity,
            unit_price_cents: None,
            tax_rate_bps: None,
        }
    }

    pub fn at_price(mut self, unit_price_cents: i64) -> Self {
        self.unit_price_cents = Some(unit_price_cents);
        self
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice issued to a customer.
///
/// All money fields except `discount_cents` are derived: totals from the
/// items, paid/balance/payment status from the completed payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub owner_id: String,
    pub invoice_number: String,
    pub kind: InvoiceKind,
    pub customer_id: String,
    /// Customer name at time of invoicing (frozen).
    pub customer_name: String,
    pub items: Vec<InvoiceItem>,
    /// Invoice-level rate for lines without their own.
    pub tax_rate_bps: u32,
    pub discount_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_amount_cents: i64,
    pub balance_amount_cents: i64,
    pub payment_status: PaymentStatus,
    pub status: InvoiceStatus,
    #[ts(as = "String")]
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_amount_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == InvoiceStatus::Cancelled
    }

    #[inline]
    pub fn is_sale(&self) -> bool {
        self.kind == InvoiceKind::Sale
    }

    /// Paid either by payments or by lifecycle status, and not cancelled.
    pub fn is_paid(&self) -> bool {
        !self.is_cancelled()
            && (self.payment_status == PaymentStatus::Paid || self.status == InvoiceStatus::Paid)
    }

    /// Not cancelled and not fully paid.
    pub fn is_pending(&self) -> bool {
        !self.is_cancelled() && self.payment_status != PaymentStatus::Paid
    }

    /// Pending or partially paid, not cancelled, and `due_date < now`.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_cancelled()
            && matches!(
                self.payment_status,
                PaymentStatus::Pending | PaymentStatus::Partial
            )
            && self.due_date < now
    }

    /// Issued invoices contribute to the customer's outstanding balance.
    pub fn is_issued(&self) -> bool {
        matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Paid)
    }

    /// Trailing digits of the invoice number, if any.
    pub fn number_suffix(&self) -> Option<u64> {
        crate::numbering::trailing_number(&self.invoice_number)
    }
}

/// Fields for `add_invoice`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub customer_id: String,
    pub items: Vec<NewInvoiceItem>,
    #[serde(default)]
    pub kind: InvoiceKind,
    /// Generated from the business settings when unset.
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Defaults to the business default rate.
    #[serde(default)]
    pub tax_rate_bps: Option<u32>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub status: InvoiceStatus,
    /// Defaults to creation time plus the business default due days.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for `update_invoice`. Totals are always recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct InvoicePatch {
    pub customer_id: Option<String>,
    pub invoice_number: Option<String>,
    pub items: Option<Vec<NewInvoiceItem>>,
    pub kind: Option<InvoiceKind>,
    pub tax_rate_bps: Option<u32>,
    pub discount_cents: Option<i64>,
    pub status: Option<InvoiceStatus>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards an invoice.
/// An invoice can have multiple payments for partial settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub owner_id: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    /// External reference (UPI txn id, cheque number, etc.).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Fields for `add_payment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub invoice_id: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

impl NewPayment {
    /// A completed cash payment.
    pub fn completed(invoice_id: impl Into<String>, amount_cents: i64) -> Self {
        NewPayment {
            invoice_id: invoice_id.into(),
            amount_cents,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }
}
