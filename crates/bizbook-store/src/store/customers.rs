//! Customer operations.

use chrono::Utc;
use tracing::{debug, info};

use bizbook_core::analytics::{customer_statement, StatementEntry};
use bizbook_core::query::{over_credit_limit, search_customers};
use bizbook_core::validation::validate_customer;
use bizbook_core::{new_id, CoreError, Customer, CustomerPatch, Entity, EntityKind, NewCustomer};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

impl BusinessStore {
    pub fn add_customer(&self, input: NewCustomer) -> StoreResult<Customer> {
        let customer = input.into_customer(new_id(), self.scope(), Utc::now());
        validate_customer(&customer)?;

        let mut state = self.begin()?;
        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Customer(customer.clone()));
        self.commit(state, batch);

        info!(customer_id = %customer.id, name = %customer.name, "Customer added");
        Ok(customer)
    }

    /// Merges `patch` into the customer. The outstanding balance is derived
    /// from invoices and is not patchable.
    pub fn update_customer(&self, id: &str, patch: CustomerPatch) -> StoreResult<Customer> {
        let mut state = self.begin()?;
        let mut customer = state
            .data
            .customer(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Customer, id))?;

        customer.apply_patch(&patch);
        validate_customer(&customer)?;
        customer.updated_at = Utc::now();

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Customer(customer.clone()));
        self.commit(state, batch);

        debug!(customer_id = %id, "Customer updated");
        Ok(customer)
    }

    /// ## Errors
    /// - `NotFound` when the customer is unknown
    /// - `ReferentialIntegrityViolation` while any invoice references it
    pub fn delete_customer(&self, id: &str) -> StoreResult<()> {
        let mut state = self.begin()?;
        if !state.data.contains(EntityKind::Customer, id) {
            return Err(CoreError::not_found(EntityKind::Customer, id).into());
        }

        let dependents = state
            .data
            .invoices
            .iter()
            .filter(|i| i.customer_id == id)
            .count();
        if dependents > 0 {
            return Err(CoreError::ReferentialIntegrityViolation {
                kind: EntityKind::Customer,
                id: id.to_string(),
                dependent_kind: EntityKind::Invoice,
                dependents,
            }
            .into());
        }

        let mut batch = ChangeBatch::default();
        batch.remove(&mut state.data, EntityKind::Customer, id);
        self.commit(state, batch);

        info!(customer_id = %id, "Customer deleted");
        Ok(())
    }

    pub fn customer(&self, id: &str) -> Option<Customer> {
        self.with_data(|data| data.customer(id).cloned())
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.with_data(|data| data.customers.clone())
    }

    /// Case-insensitive match on name, phone, email or GST number.
    pub fn search_customers(&self, query: &str) -> Vec<Customer> {
        self.with_data(|data| {
            search_customers(&data.customers, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Customers with a credit limit whose outstanding balance exceeds it.
    pub fn customers_over_credit_limit(&self) -> Vec<Customer> {
        self.with_data(|data| {
            over_credit_limit(&data.customers)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Chronological ledger of the customer's issued invoices and completed
    /// payments.
    pub fn customer_statement(&self, customer_id: &str) -> StoreResult<Vec<StatementEntry>> {
        self.with_data(|data| {
            if data.customer(customer_id).is_none() {
                return Err(CoreError::not_found(EntityKind::Customer, customer_id).into());
            }
            Ok(customer_statement(data, customer_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;
    use crate::StoreError;

    fn sarah() -> NewCustomer {
        NewCustomer {
            name: "Sarah Johnson".into(),
            phone: "+1987654321".into(),
            email: Some("sarah.j@email.com".into()),
            address: "456 Oak Ave, City, State 12345".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_search_customer() {
        let store = ready_store().await;
        let customer = store.add_customer(sarah()).unwrap();

        assert_eq!(customer.outstanding_balance_cents, 0);
        assert_eq!(customer.owner_id, "shop");
        assert_eq!(store.search_customers("SARAH.J").len(), 1);
        assert_eq!(store.search_customers("98765").len(), 1);
        assert!(store.search_customers("mike").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let store = ready_store().await;
        let mut input = sarah();
        input.email = Some("not-an-email".into());

        assert!(store.add_customer(input).unwrap_err().is_validation());
        assert!(store.customers().is_empty());
    }

    #[tokio::test]
    async fn test_update_clears_optional_field() {
        let store = ready_store().await;
        let customer = store.add_customer(sarah()).unwrap();

        let updated = store
            .update_customer(
                &customer.id,
                CustomerPatch {
                    email: Some(String::new()),
                    credit_limit_cents: Some(50_000),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.email, None);
        assert_eq!(updated.credit_limit_cents, 50_000);
        assert!(updated.updated_at >= customer.updated_at);
    }

    #[tokio::test]
    async fn test_delete_unknown_customer() {
        let store = ready_store().await;
        assert!(matches!(
            store.delete_customer("missing"),
            Err(StoreError::Core(CoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_statement_requires_known_customer() {
        let store = ready_store().await;
        assert!(store.customer_statement("missing").unwrap_err().is_not_found());

        let customer = store.add_customer(sarah()).unwrap();
        assert!(store.customer_statement(&customer.id).unwrap().is_empty());
    }
}
