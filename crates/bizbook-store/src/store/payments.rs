//! Payments. Append-only; a pending payment can later complete or fail.
//!
//! ```text
//! add_payment / update_payment_status
//!      │
//!      ├── apply_payments(invoice, all payments)   full re-sum, never incremental
//!      └── refresh_outstanding(customer)
//! ```

use chrono::Utc;
use tracing::{debug, info};

use bizbook_core::invoice::apply_payments;
use bizbook_core::validation::validate_payment_amount;
use bizbook_core::{
    new_id, BusinessData, CoreError, Entity, EntityKind, NewPayment, Payment,
    TransactionStatus,
};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

/// Re-derives the invoice's payment fields from every payment it has and
/// stages the invoice and its customer.
fn settle_invoice(
    data: &mut BusinessData,
    batch: &mut ChangeBatch,
    invoice_id: &str,
    now: chrono::DateTime<Utc>,
) {
    let Some(mut invoice) = data.invoice(invoice_id).cloned() else {
        return;
    };
    apply_payments(&mut invoice, &data.payments);
    invoice.updated_at = now;

    let customer_id = invoice.customer_id.clone();
    batch.upsert(data, Entity::Invoice(invoice));
    batch.refresh_outstanding(data, &customer_id, now);
}

impl BusinessStore {
    /// Records a payment and recomputes the invoice from all of its
    /// completed payments.
    ///
    /// ## Errors
    /// - `Validation` for a non-positive amount
    /// - `NotFound` for an unknown invoice
    /// - `InvalidState` when the invoice is cancelled
    pub fn add_payment(&self, input: NewPayment) -> StoreResult<Payment> {
        validate_payment_amount(input.amount_cents)?;
        let now = Utc::now();

        let mut state = self.begin()?;
        let invoice = state
            .data
            .invoice(&input.invoice_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Invoice, &input.invoice_id))?;
        if invoice.is_cancelled() {
            return Err(CoreError::InvalidState {
                kind: EntityKind::Invoice,
                id: invoice.id.clone(),
                state: "cancelled".to_string(),
                reason: "payments cannot be recorded against a cancelled invoice".to_string(),
            }
            .into());
        }

        let payment = Payment {
            id: new_id(),
            owner_id: self.scope().as_str().to_string(),
            invoice_id: input.invoice_id,
            amount_cents: input.amount_cents,
            method: input.method,
            status: input.status,
            reference: input
                .reference
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_at: now,
            updated_at: now,
        };

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Payment(payment.clone()));
        settle_invoice(&mut state.data, &mut batch, &payment.invoice_id, now);
        self.commit(state, batch);

        info!(
            payment_id = %payment.id,
            invoice_id = %payment.invoice_id,
            amount_cents = payment.amount_cents,
            status = ?payment.status,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Moves a pending payment to completed or failed.
    ///
    /// Setting the current status again is a no-op. Completed and failed
    /// payments are final.
    pub fn update_payment_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> StoreResult<Payment> {
        let now = Utc::now();
        let mut state = self.begin()?;
        let mut payment = state
            .data
            .payment(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Payment, id))?;

        if payment.status == status {
            return Ok(payment);
        }
        if payment.status != TransactionStatus::Pending {
            return Err(CoreError::InvalidState {
                kind: EntityKind::Payment,
                id: id.to_string(),
                state: format!("{:?}", payment.status).to_lowercase(),
                reason: "only pending payments can change status".to_string(),
            }
            .into());
        }

        payment.status = status;
        payment.updated_at = now;

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Payment(payment.clone()));
        settle_invoice(&mut state.data, &mut batch, &payment.invoice_id, now);
        self.commit(state, batch);

        debug!(payment_id = %id, status = ?status, "Payment status updated");
        Ok(payment)
    }

    pub fn payment(&self, id: &str) -> Option<Payment> {
        self.with_data(|data| data.payment(id).cloned())
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.with_data(|data| data.payments.clone())
    }

    pub fn payments_for_invoice(&self, invoice_id: &str) -> Vec<Payment> {
        self.with_data(|data| {
            data.payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect()
        })
    }
}
