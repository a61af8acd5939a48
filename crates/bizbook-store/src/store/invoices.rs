//! # Invoice Operations
//!
//! ## Derived Fields
//! ```text
//! add_invoice / update_invoice
//!      │
//!      ├── items ──► build_item (freeze product name/SKU/price)
//!      ├── recompute_totals      subtotal, tax, total from items
//!      ├── apply_payments        paid, balance, payment_status, status
//!      └── refresh_outstanding   customer.outstanding_balance
//! ```
//!
//! Totals are never taken from the caller. Every write of an invoice goes
//! through the same recompute, so totals and payments always agree.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use bizbook_core::invoice::{apply_payments, build_item, recompute_totals, validate_lines};
use bizbook_core::numbering::next_invoice_number;
use bizbook_core::query::{overdue_at, pending, search_invoices};
use bizbook_core::validation::{validate_amount, validate_tax_rate_bps};
use bizbook_core::{
    new_id, BusinessData, CoreError, Entity, EntityKind, Invoice, InvoiceItem, InvoicePatch,
    NewInvoice, NewInvoiceItem, ValidationError,
};

use super::{BusinessStore, ChangeBatch};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Helpers
// =============================================================================

fn ensure_unique_number(
    data: &BusinessData,
    number: &str,
    except_id: Option<&str>,
) -> StoreResult<()> {
    let taken = data
        .invoices
        .iter()
        .any(|i| Some(i.id.as_str()) != except_id && i.invoice_number == number);
    if taken {
        return Err(ValidationError::Duplicate {
            field: "invoice_number".to_string(),
            value: number.to_string(),
        }
        .into());
    }
    Ok(())
}

fn required_number(number: &str) -> StoreResult<String> {
    let number = number.trim();
    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "invoice_number".to_string(),
        }
        .into());
    }
    Ok(number.to_string())
}

/// Builds lines from the current catalogue.
///
/// On an edit, a line whose product has since been deleted keeps the
/// snapshot it already had; any other unknown product is `NotFound`.
fn build_items(
    data: &BusinessData,
    inputs: &[NewInvoiceItem],
    previous: &[InvoiceItem],
) -> StoreResult<Vec<InvoiceItem>> {
    inputs
        .iter()
        .map(|input| {
            if let Some(product) = data.product(&input.product_id) {
                return Ok(build_item(product, input));
            }
            previous
                .iter()
                .find(|line| line.product_id == input.product_id)
                .map(|line| InvoiceItem {
                    quantity: input.quantity,
                    unit_price_cents: input.unit_price_cents.unwrap_or(line.unit_price_cents),
                    tax_rate_bps: input.tax_rate_bps.or(line.tax_rate_bps),
                    ..line.clone()
                })
                .ok_or_else(|| {
                    StoreError::from(CoreError::not_found(EntityKind::Product, &input.product_id))
                })
        })
        .collect()
}

// =============================================================================
// Mutations
// =============================================================================

impl BusinessStore {
    /// Creates an invoice for an existing customer.
    ///
    /// ## Defaults
    /// - `invoice_number`: next number from the configured prefix and width
    /// - `tax_rate_bps`: the business default rate
    /// - `due_date`: now plus the business default due days
    ///
    /// Creating an invoice does not move stock.
    ///
    /// ## Errors
    /// - `Validation` for empty or malformed lines, a negative discount, an
    ///   out-of-range rate or a duplicate number
    /// - `NotFound` for an unknown customer or product
    pub fn add_invoice(&self, input: NewInvoice) -> StoreResult<Invoice> {
        validate_lines(&input.items, input.discount_cents)?;
        if let Some(bps) = input.tax_rate_bps {
            validate_tax_rate_bps(bps)?;
        }
        let now = Utc::now();
        let settings = self.settings();

        let mut state = self.begin()?;
        let customer = state
            .data
            .customer(&input.customer_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Customer, &input.customer_id))?;
        let customer_name = customer.name.clone();
        let items = build_items(&state.data, &input.items, &[])?;

        let invoice_number = match input.invoice_number.as_deref() {
            Some(number) => {
                let number = required_number(number)?;
                ensure_unique_number(&state.data, &number, None)?;
                number
            }
            None => {
                let number = next_invoice_number(
                    state.data.invoices.iter().map(|i| i.invoice_number.as_str()),
                    settings,
                    now,
                );
                // The suffix saturates once it reaches u64::MAX.
                ensure_unique_number(&state.data, &number, None)?;
                number
            }
        };

        let mut invoice = Invoice {
            id: new_id(),
            owner_id: self.scope().as_str().to_string(),
            invoice_number,
            kind: input.kind,
            customer_id: input.customer_id,
            customer_name,
            items,
            tax_rate_bps: input.tax_rate_bps.unwrap_or(settings.default_tax_rate_bps),
            discount_cents: input.discount_cents,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            paid_amount_cents: 0,
            balance_amount_cents: 0,
            payment_status: Default::default(),
            status: input.status,
            due_date: input
                .due_date
                .unwrap_or_else(|| now + Duration::days(i64::from(settings.default_due_days))),
            notes: input
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: now,
            updated_at: now,
        };
        recompute_totals(&mut invoice);
        apply_payments(&mut invoice, &state.data.payments);

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Invoice(invoice.clone()));
        batch.refresh_outstanding(&mut state.data, &invoice.customer_id, now);
        self.commit(state, batch);

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            customer_id = %invoice.customer_id,
            total_cents = invoice.total_cents,
            "Invoice created"
        );
        Ok(invoice)
    }

    /// Merges `patch` into the invoice and re-derives totals, payment state
    /// and the affected customers' outstanding balances.
    ///
    /// An empty `notes` clears the notes. Changing the customer refreshes
    /// the name snapshot.
    pub fn update_invoice(&self, id: &str, patch: InvoicePatch) -> StoreResult<Invoice> {
        let now = Utc::now();
        let mut state = self.begin()?;
        let original = state
            .data
            .invoice(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Invoice, id))?;
        let mut invoice = original.clone();

        let discount = patch.discount_cents.unwrap_or(invoice.discount_cents);
        match &patch.items {
            Some(items) => validate_lines(items, discount)?,
            None => validate_amount("discount", discount)?,
        }
        if let Some(bps) = patch.tax_rate_bps {
            validate_tax_rate_bps(bps)?;
        }

        if let Some(customer_id) = &patch.customer_id {
            if *customer_id != invoice.customer_id {
                let customer = state
                    .data
                    .customer(customer_id)
                    .ok_or_else(|| CoreError::not_found(EntityKind::Customer, customer_id))?;
                invoice.customer_id = customer.id.clone();
                invoice.customer_name = customer.name.clone();
            }
        }
        if let Some(number) = &patch.invoice_number {
            let number = required_number(number)?;
            ensure_unique_number(&state.data, &number, Some(id))?;
            invoice.invoice_number = number;
        }
        if let Some(items) = &patch.items {
            invoice.items = build_items(&state.data, items, &original.items)?;
        }
        if let Some(kind) = patch.kind {
            invoice.kind = kind;
        }
        if let Some(bps) = patch.tax_rate_bps {
            invoice.tax_rate_bps = bps;
        }
        invoice.discount_cents = discount;
        if let Some(status) = patch.status {
            invoice.status = status;
        }
        if let Some(due_date) = patch.due_date {
            invoice.due_date = due_date;
        }
        if let Some(notes) = &patch.notes {
            let notes = notes.trim();
            invoice.notes = (!notes.is_empty()).then(|| notes.to_string());
        }

        recompute_totals(&mut invoice);
        apply_payments(&mut invoice, &state.data.payments);
        invoice.updated_at = now;

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Invoice(invoice.clone()));
        batch.refresh_outstanding(&mut state.data, &original.customer_id, now);
        if invoice.customer_id != original.customer_id {
            batch.refresh_outstanding(&mut state.data, &invoice.customer_id, now);
        }
        self.commit(state, batch);

        debug!(
            invoice_id = %id,
            total_cents = invoice.total_cents,
            status = ?invoice.status,
            "Invoice updated"
        );
        Ok(invoice)
    }

    /// Deletes the invoice together with its payments.
    pub fn delete_invoice(&self, id: &str) -> StoreResult<()> {
        let now = Utc::now();
        let mut state = self.begin()?;
        let customer_id = state
            .data
            .invoice(id)
            .map(|i| i.customer_id.clone())
            .ok_or_else(|| CoreError::not_found(EntityKind::Invoice, id))?;
        let payment_ids: Vec<String> = state
            .data
            .payments
            .iter()
            .filter(|p| p.invoice_id == id)
            .map(|p| p.id.clone())
            .collect();

        let mut batch = ChangeBatch::default();
        for payment_id in &payment_ids {
            batch.remove(&mut state.data, EntityKind::Payment, payment_id);
        }
        batch.remove(&mut state.data, EntityKind::Invoice, id);
        batch.refresh_outstanding(&mut state.data, &customer_id, now);
        self.commit(state, batch);

        info!(invoice_id = %id, payments = payment_ids.len(), "Invoice deleted");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn invoice(&self, id: &str) -> Option<Invoice> {
        self.with_data(|data| data.invoice(id).cloned())
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.with_data(|data| data.invoices.clone())
    }

    pub fn invoices_for_customer(&self, customer_id: &str) -> Vec<Invoice> {
        self.with_data(|data| {
            data.invoices
                .iter()
                .filter(|i| i.customer_id == customer_id)
                .cloned()
                .collect()
        })
    }

    /// Case-insensitive match on invoice number or customer name.
    pub fn search_invoices(&self, query: &str) -> Vec<Invoice> {
        self.with_data(|data| {
            search_invoices(&data.invoices, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Not cancelled and not fully paid.
    pub fn pending_invoices(&self) -> Vec<Invoice> {
        self.with_data(|data| pending(&data.invoices).into_iter().cloned().collect())
    }

    pub fn overdue_invoices(&self) -> Vec<Invoice> {
        self.overdue_invoices_at(Utc::now())
    }

    /// Pending or partially paid with a due date strictly before `now`.
    pub fn overdue_invoices_at(&self, now: DateTime<Utc>) -> Vec<Invoice> {
        self.with_data(|data| overdue_at(&data.invoices, now).into_iter().cloned().collect())
    }

    /// The number the next invoice would get.
    pub fn next_invoice_number(&self) -> String {
        self.with_data(|data| {
            next_invoice_number(
                data.invoices.iter().map(|i| i.invoice_number.as_str()),
                self.settings(),
                Utc::now(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;
    use bizbook_core::{
        Customer, InvoiceStatus, NewCustomer, NewPayment, NewProduct, PaymentStatus, Product,
    };

    async fn fixture() -> (BusinessStore, Customer, Product, Product) {
        let store = ready_store().await;
        let customer = store
            .add_customer(NewCustomer {
                name: "John Smith".into(),
                phone: "+1234567890".into(),
                ..Default::default()
            })
            .unwrap();
        let product = |name: &str, sku: &str, price_cents| NewProduct {
            name: name.into(),
            sku: sku.into(),
            price_cents,
            quantity: 20,
            category: "General".into(),
            low_stock_threshold: 5,
            ..Default::default()
        };
        let a = store.add_product(product("Widget", "WID-1", 1000)).unwrap();
        let b = store.add_product(product("Gadget", "GAD-1", 500)).unwrap();
        (store, customer, a, b)
    }

    fn sale(customer: &Customer, items: Vec<NewInvoiceItem>) -> NewInvoice {
        NewInvoice {
            customer_id: customer.id.clone(),
            items,
            status: InvoiceStatus::Sent,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_totals_computed_from_items() {
        let (store, customer, a, b) = fixture().await;
        let invoice = store
            .add_invoice(sale(
                &customer,
                vec![NewInvoiceItem::new(&a.id, 2), NewInvoiceItem::new(&b.id, 1)],
            ))
            .unwrap();

        assert_eq!(invoice.invoice_number, "INV-001");
        assert_eq!(invoice.subtotal_cents, 2500);
        assert_eq!(invoice.tax_cents, 250);
        assert_eq!(invoice.total_cents, 2750);
        assert_eq!(invoice.balance_amount_cents, 2750);
        assert_eq!(invoice.payment_status, PaymentStatus::Pending);
        assert_eq!(invoice.customer_name, "John Smith");
        assert_eq!(
            store.customer(&customer.id).unwrap().outstanding_balance_cents,
            2750
        );
        // Invoicing leaves stock alone.
        assert_eq!(store.product(&a.id).unwrap().quantity, 20);
    }

    #[tokio::test]
    async fn test_numbering_continues_from_highest() {
        let (store, customer, a, _) = fixture().await;
        for number in ["INV-001", "INV-003"] {
            let mut input = sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]);
            input.invoice_number = Some(number.into());
            store.add_invoice(input).unwrap();
        }

        assert_eq!(store.next_invoice_number(), "INV-004");
        let next = store
            .add_invoice(sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]))
            .unwrap();
        assert_eq!(next.invoice_number, "INV-004");

        let mut duplicate = sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]);
        duplicate.invoice_number = Some("INV-003".into());
        assert!(store.add_invoice(duplicate).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_exhausted_numbering_never_duplicates() {
        let (store, customer, a, _) = fixture().await;
        let last = format!("INV-{}", u64::MAX);
        let mut input = sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]);
        input.invoice_number = Some(last.clone());
        store.add_invoice(input).unwrap();

        let err = store
            .add_invoice(sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]))
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.invoices().len(), 1);
        assert_eq!(store.invoices()[0].invoice_number, last);
    }

    #[tokio::test]
    async fn test_rejects_unknown_references_without_side_effects() {
        let (store, customer, a, _) = fixture().await;
        let before = store.snapshot();

        let mut unknown_customer = sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]);
        unknown_customer.customer_id = "missing".into();
        assert!(store.add_invoice(unknown_customer).unwrap_err().is_not_found());

        let unknown_product = sale(&customer, vec![NewInvoiceItem::new("missing", 1)]);
        assert!(store.add_invoice(unknown_product).unwrap_err().is_not_found());

        assert!(store.add_invoice(sale(&customer, vec![])).unwrap_err().is_validation());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_item_edit_reverts_paid_invoice() {
        let (store, customer, a, b) = fixture().await;
        let invoice = store
            .add_invoice(sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]))
            .unwrap();
        store
            .add_payment(NewPayment::completed(&invoice.id, 1100))
            .unwrap();
        assert_eq!(store.invoice(&invoice.id).unwrap().status, InvoiceStatus::Paid);

        let edited = store
            .update_invoice(
                &invoice.id,
                InvoicePatch {
                    items: Some(vec![NewInvoiceItem::new(&a.id, 1), NewInvoiceItem::new(&b.id, 2)]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(edited.total_cents, 2200);
        assert_eq!(edited.paid_amount_cents, 1100);
        assert_eq!(edited.balance_amount_cents, 1100);
        assert_eq!(edited.payment_status, PaymentStatus::Partial);
        assert_eq!(edited.status, InvoiceStatus::Sent);
        assert_eq!(
            store.customer(&customer.id).unwrap().outstanding_balance_cents,
            1100
        );
    }

    #[tokio::test]
    async fn test_edit_keeps_lines_of_deleted_products() {
        let (store, customer, a, b) = fixture().await;
        let invoice = store
            .add_invoice(sale(
                &customer,
                vec![NewInvoiceItem::new(&a.id, 1), NewInvoiceItem::new(&b.id, 1)],
            ))
            .unwrap();
        store.delete_product(&a.id).unwrap();

        let edited = store
            .update_invoice(
                &invoice.id,
                InvoicePatch {
                    items: Some(vec![NewInvoiceItem::new(&a.id, 3)]),
                    notes: Some("reprinted".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.items.len(), 1);
        assert_eq!(edited.items[0].product_name, "Widget");
        assert_eq!(edited.subtotal_cents, 3000);
        assert_eq!(edited.notes.as_deref(), Some("reprinted"));

        let cleared = store
            .update_invoice(
                &invoice.id,
                InvoicePatch {
                    notes: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.notes, None);
    }

    #[tokio::test]
    async fn test_customer_change_moves_outstanding() {
        let (store, john, a, _) = fixture().await;
        let sarah = store
            .add_customer(NewCustomer {
                name: "Sarah Johnson".into(),
                phone: "+1987654321".into(),
                ..Default::default()
            })
            .unwrap();
        let invoice = store
            .add_invoice(sale(&john, vec![NewInvoiceItem::new(&a.id, 1)]))
            .unwrap();

        let moved = store
            .update_invoice(
                &invoice.id,
                InvoicePatch {
                    customer_id: Some(sarah.id.clone()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(moved.customer_name, "Sarah Johnson");
        assert_eq!(store.customer(&john.id).unwrap().outstanding_balance_cents, 0);
        assert_eq!(store.customer(&sarah.id).unwrap().outstanding_balance_cents, 1100);
    }

    #[tokio::test]
    async fn test_cancel_and_delete_invoice() {
        let (store, customer, a, _) = fixture().await;
        let invoice = store
            .add_invoice(sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]))
            .unwrap();
        store
            .add_payment(NewPayment::completed(&invoice.id, 500))
            .unwrap();

        let cancelled = store
            .update_invoice(
                &invoice.id,
                InvoicePatch {
                    status: Some(InvoiceStatus::Cancelled),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
        assert!(store.pending_invoices().is_empty());
        assert_eq!(store.customer(&customer.id).unwrap().outstanding_balance_cents, 0);

        store.delete_invoice(&invoice.id).unwrap();
        assert!(store.invoices().is_empty());
        assert!(store.payments().is_empty());
        assert!(store.delete_invoice(&invoice.id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_overdue_uses_strict_due_date() {
        let (store, customer, a, _) = fixture().await;
        let due = Utc::now() - Duration::days(1);
        let mut input = sale(&customer, vec![NewInvoiceItem::new(&a.id, 1)]);
        input.due_date = Some(due);
        store.add_invoice(input).unwrap();

        assert!(store.overdue_invoices_at(due).is_empty());
        assert_eq!(store.overdue_invoices_at(due + Duration::seconds(1)).len(), 1);
        assert_eq!(store.overdue_invoices().len(), 1);
        assert_eq!(store.search_invoices("john").len(), 1);
        assert_eq!(store.invoices_for_customer(&customer.id).len(), 1);
    }
}
