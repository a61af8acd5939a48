//! # Invoice Derivations
//!
//! Everything on an invoice that is computed rather than entered.
//!
//! ## Derivation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  NewInvoiceItem + Product ──► build_item() ──► InvoiceItem (snapshot)   │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                      recompute_totals(): subtotal, tax, total           │
//! │                                                    │                    │
//! │  Payments (completed only) ──► apply_payments(): paid, balance,         │
//! │                                 payment_status, lifecycle status        │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                 customer_outstanding(): Σ balance of issued sales       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function rebuilds its outputs from scratch. Nothing is applied
//! incrementally, so re-running after a retried or reordered payment insert
//! produces the same result.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{
    Invoice, InvoiceItem, InvoiceStatus, NewInvoiceItem, Payment, PaymentStatus, Product, TaxRate,
};
use crate::validation::{
    validate_amount, validate_invoice_item_count, validate_quantity, validate_tax_rate_bps,
    ValidationResult,
};

// =============================================================================
// Items & Totals
// =============================================================================

/// Validates invoice line input and the invoice-level discount.
pub fn validate_lines(items: &[NewInvoiceItem], discount_cents: i64) -> ValidationResult<()> {
    validate_invoice_item_count(items.len())?;
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        validate_quantity(item.quantity)?;
        if let Some(price) = item.unit_price_cents {
            validate_amount("unit_price", price)?;
        }
        if let Some(bps) = item.tax_rate_bps {
            validate_tax_rate_bps(bps)?;
        }
    }
    validate_amount("discount", discount_cents)
}

/// Builds a line from caller input, freezing the product's name and SKU.
///
/// The unit price defaults to the product's current price and the tax rate
/// to the product's own rate. Line totals are filled in by
/// [`recompute_totals`].
pub fn build_item(product: &Product, input: &NewInvoiceItem) -> InvoiceItem {
    InvoiceItem {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        sku: product.sku.clone(),
        quantity: input.quantity,
        unit_price_cents: input.unit_price_cents.unwrap_or(product.price_cents),
        tax_rate_bps: input.tax_rate_bps.or(product.tax_rate_bps),
        line_total_cents: 0,
        tax_cents: 0,
    }
}

/// Recomputes every line and the invoice totals from the items.
///
/// ```text
/// line_total = quantity × unit_price
/// line_tax   = tax(line_total, item rate or invoice rate)
/// total      = max(0, Σ line_total + Σ line_tax − discount)
/// ```
///
/// ## Example
/// ```rust
/// # use bizbook_core::invoice::recompute_totals;
/// # use bizbook_core::types::*;
/// # use chrono::Utc;
/// let line = |qty, price| InvoiceItem {
///     product_id: "p".into(), product_name: "Widget".into(), sku: "W".into(),
///     quantity: qty, unit_price_cents: price, tax_rate_bps: None,
///     line_total_cents: 0, tax_cents: 0,
/// };
/// let mut invoice = Invoice {
///     id: "i".into(), owner_id: "o".into(), invoice_number: "INV-001".into(),
///     kind: InvoiceKind::Sale, customer_id: "c".into(), customer_name: "A".into(),
///     items: vec![line(2, 1000), line(1, 500)], tax_rate_bps: 1000, discount_cents: 0,
///     subtotal_cents: 0, tax_cents: 0, total_cents: 0, paid_amount_cents: 0,
///     balance_amount_cents: 0, payment_status: PaymentStatus::Pending,
///     status: InvoiceStatus::Draft, due_date: Utc::now(), notes: None,
///     created_at: Utc::now(), updated_at: Utc::now(),
/// };
/// recompute_totals(&mut invoice);
/// assert_eq!(invoice.subtotal_cents, 2500);
/// assert_eq!(invoice.tax_cents, 250);
/// assert_eq!(invoice.total_cents, 2750);
/// ```
pub fn recompute_totals(invoice: &mut Invoice) {
    let invoice_rate = TaxRate::from_bps(invoice.tax_rate_bps);
    let mut subtotal = Money::zero();
    let mut tax = Money::zero();

    for item in &mut invoice.items {
        let line_total = Money::from_cents(item.unit_price_cents).multiply_quantity(item.quantity);
        let rate = item.tax_rate_bps.map(TaxRate::from_bps).unwrap_or(invoice_rate);
        let line_tax = line_total.calculate_tax(rate);

        item.line_total_cents = line_total.cents();
        item.tax_cents = line_tax.cents();
        subtotal += line_total;
        tax += line_tax;
    }

    let total = (subtotal + tax - Money::from_cents(invoice.discount_cents)).floor_zero();

    invoice.subtotal_cents = subtotal.cents();
    invoice.tax_cents = tax.cents();
    invoice.total_cents = total.cents();
}

// =============================================================================
// Payments
// =============================================================================

/// Three-way rule: nothing paid, partly paid, fully paid.
///
/// A zero total counts as fully paid.
pub fn payment_status_for(paid: Money, total: Money) -> PaymentStatus {
    if paid >= total {
        PaymentStatus::Paid
    } else if paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// Sum of completed payments recorded against `invoice_id`.
pub fn completed_paid_amount<'a>(
    invoice_id: &str,
    payments: impl IntoIterator<Item = &'a Payment>,
) -> Money {
    payments
        .into_iter()
        .filter(|p| p.invoice_id == invoice_id && p.is_completed())
        .map(Payment::amount)
        .sum()
}

/// Rebuilds paid amount, balance, payment status and lifecycle status from
/// the full payment collection.
///
/// ## Lifecycle Coupling
/// - Fully paid draft or sent invoices (with a non-zero total) move to `Paid`
/// - A `Paid` invoice whose payments no longer cover the total (e.g. after
///   its items were edited) moves back to `Sent`
/// - Cancelled invoices keep their status
pub fn apply_payments<'a>(invoice: &mut Invoice, payments: impl IntoIterator<Item = &'a Payment>) {
    let paid = completed_paid_amount(&invoice.id, payments);
    let total = invoice.total();

    invoice.paid_amount_cents = paid.cents();
    invoice.balance_amount_cents = (total - paid).floor_zero().cents();
    invoice.payment_status = payment_status_for(paid, total);

    match invoice.status {
        InvoiceStatus::Draft | InvoiceStatus::Sent
            if invoice.payment_status == PaymentStatus::Paid && total.is_positive() =>
        {
            invoice.status = InvoiceStatus::Paid;
        }
        InvoiceStatus::Paid if invoice.payment_status != PaymentStatus::Paid => {
            invoice.status = InvoiceStatus::Sent;
        }
        _ => {}
    }
}

// =============================================================================
// Customers
// =============================================================================

/// Outstanding balance of a customer: Σ balance over their issued
/// (sent or paid) sale invoices.
pub fn customer_outstanding<'a>(
    customer_id: &str,
    invoices: impl IntoIterator<Item = &'a Invoice>,
) -> Money {
    invoices
        .into_iter()
        .filter(|inv| inv.customer_id == customer_id && inv.is_sale() && inv.is_issued())
        .map(Invoice::balance)
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InvoiceKind, PaymentMethod, TransactionStatus};
    use chrono::Utc;
    use proptest::prelude::*;

    fn item(quantity: i64, unit_price_cents: i64) -> InvoiceItem {
        InvoiceItem {
            product_id: "p1".to_string(),
            product_name: "Widget".to_string(),
            sku: "W-1".to_string(),
            quantity,
            unit_price_cents,
            tax_rate_bps: None,
            line_total_cents: 0,
            tax_cents: 0,
        }
    }

    fn invoice(items: Vec<InvoiceItem>, tax_rate_bps: u32) -> Invoice {
        let now = Utc::now();
        let mut invoice = Invoice {
            id: "inv-1".to_string(),
            owner_id: "owner".to_string(),
            invoice_number: "INV-001".to_string(),
            kind: InvoiceKind::Sale,
            customer_id: "c1".to_string(),
            customer_name: "Alice".to_string(),
            items,
            tax_rate_bps,
            discount_cents: 0,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            paid_amount_cents: 0,
            balance_amount_cents: 0,
            payment_status: PaymentStatus::Pending,
            status: InvoiceStatus::Sent,
            due_date: now,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        recompute_totals(&mut invoice);
        apply_payments(&mut invoice, std::iter::empty());
        invoice
    }

    fn payment(id: &str, amount_cents: i64, status: TransactionStatus) -> Payment {
        let now = Utc::now();
        Payment {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            invoice_id: "inv-1".to_string(),
            amount_cents,
            method: PaymentMethod::Cash,
            status,
            reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_two_line_invoice_totals() {
        let inv = invoice(vec![item(2, 1000), item(1, 500)], 1000);
        assert_eq!(inv.subtotal_cents, 2500);
        assert_eq!(inv.tax_cents, 250);
        assert_eq!(inv.total_cents, 2750);
        assert_eq!(inv.items[0].line_total_cents, 2000);
        assert_eq!(inv.balance_amount_cents, 2750);
        assert_eq!(inv.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_line_rate_overrides_invoice_rate() {
        let mut line = item(1, 10000);
        line.tax_rate_bps = Some(1800);
        let inv = invoice(vec![line, item(1, 10000)], 500);
        assert_eq!(inv.tax_cents, 1800 + 500);
    }

    #[test]
    fn test_discount_floors_total_at_zero() {
        let mut inv = invoice(vec![item(1, 1000)], 0);
        inv.discount_cents = 5000;
        recompute_totals(&mut inv);
        assert_eq!(inv.total_cents, 0);
    }

    #[test]
    fn test_full_payment_marks_paid() {
        let mut inv = invoice(vec![item(2, 1000), item(1, 500)], 1000);
        let payments = vec![payment("p1", 2750, TransactionStatus::Completed)];
        apply_payments(&mut inv, &payments);
        assert_eq!(inv.payment_status, PaymentStatus::Paid);
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.balance_amount_cents, 0);
    }

    #[test]
    fn test_pending_and_failed_payments_do_not_count() {
        let mut inv = invoice(vec![item(1, 1000)], 0);
        let payments = vec![
            payment("p1", 400, TransactionStatus::Completed),
            payment("p2", 600, TransactionStatus::Pending),
            payment("p3", 600, TransactionStatus::Failed),
        ];
        apply_payments(&mut inv, &payments);
        assert_eq!(inv.paid_amount_cents, 400);
        assert_eq!(inv.balance_amount_cents, 600);
        assert_eq!(inv.payment_status, PaymentStatus::Partial);
        assert_eq!(inv.status, InvoiceStatus::Sent);
    }

    #[test]
    fn test_overpayment_floors_balance() {
        let mut inv = invoice(vec![item(1, 1000)], 0);
        apply_payments(&mut inv, &[payment("p1", 1500, TransactionStatus::Completed)]);
        assert_eq!(inv.paid_amount_cents, 1500);
        assert_eq!(inv.balance_amount_cents, 0);
    }

    #[test]
    fn test_paid_status_reverts_when_total_grows() {
        let mut inv = invoice(vec![item(1, 1000)], 0);
        let payments = vec![payment("p1", 1000, TransactionStatus::Completed)];
        apply_payments(&mut inv, &payments);
        assert_eq!(inv.status, InvoiceStatus::Paid);

        inv.items.push(item(1, 500));
        recompute_totals(&mut inv);
        apply_payments(&mut inv, &payments);
        assert_eq!(inv.payment_status, PaymentStatus::Partial);
        assert_eq!(inv.status, InvoiceStatus::Sent);
    }

    #[test]
    fn test_cancelled_status_is_kept() {
        let mut inv = invoice(vec![item(1, 1000)], 0);
        inv.status = InvoiceStatus::Cancelled;
        apply_payments(&mut inv, &[payment("p1", 1000, TransactionStatus::Completed)]);
        assert_eq!(inv.status, InvoiceStatus::Cancelled);
    }

    #[test]
    fn test_zero_total_is_paid() {
        assert_eq!(
            payment_status_for(Money::zero(), Money::zero()),
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_customer_outstanding_counts_issued_sales_only() {
        let sent = invoice(vec![item(1, 1000)], 0);
        let mut draft = sent.clone();
        draft.id = "inv-2".to_string();
        draft.status = InvoiceStatus::Draft;
        let mut other = sent.clone();
        other.id = "inv-3".to_string();
        other.customer_id = "c2".to_string();
        let mut ret = sent.clone();
        ret.id = "inv-4".to_string();
        ret.kind = InvoiceKind::Return;

        let all = vec![sent, draft, other, ret];
        assert_eq!(customer_outstanding("c1", &all).cents(), 1000);
        assert_eq!(customer_outstanding("c2", &all).cents(), 1000);
        assert_eq!(customer_outstanding("nobody", &all).cents(), 0);
    }

    #[test]
    fn test_validate_lines() {
        assert!(validate_lines(&[NewInvoiceItem::new("p", 2)], 0).is_ok());
        assert!(validate_lines(&[], 0).is_err());
        assert!(validate_lines(&[NewInvoiceItem::new("p", 0)], 0).is_err());
        assert!(validate_lines(&[NewInvoiceItem::new("p", 1).at_price(-1)], 0).is_err());
        assert!(validate_lines(&[NewInvoiceItem::new("p", 1)], -5).is_err());
    }

    fn status_rank(status: PaymentStatus) -> u8 {
        match status {
            PaymentStatus::Pending => 0,
            PaymentStatus::Partial => 1,
            PaymentStatus::Paid => 2,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn prop_paid_amount_tracks_completed_payments(
            price in 1i64..100_000i64,
            entries in prop::collection::vec((1i64..50_000i64, 0u8..3u8), 1..12),
        ) {
            let mut inv = invoice(vec![item(1, price)], 1000);
            let total = inv.total_cents;
            let mut payments = Vec::new();
            let mut previous_rank = status_rank(inv.payment_status);

            for (n, (amount, status)) in entries.into_iter().enumerate() {
                let status = match status {
                    0 => TransactionStatus::Completed,
                    1 => TransactionStatus::Pending,
                    _ => TransactionStatus::Failed,
                };
                payments.push(payment(&format!("p{n}"), amount, status));
                apply_payments(&mut inv, &payments);

                let expected: i64 = payments
                    .iter()
                    .filter(|p| p.is_completed())
                    .map(|p| p.amount_cents)
                    .sum();
                prop_assert_eq!(inv.paid_amount_cents, expected);
                prop_assert_eq!(inv.balance_amount_cents, (total - expected).max(0));

                let rank = status_rank(inv.payment_status);
                prop_assert!(rank >= previous_rank);
                previous_rank = rank;
            }
        }
    }
}
