//! Vendor operations.

use chrono::Utc;
use tracing::{debug, info};

use bizbook_core::query::search_vendors;
use bizbook_core::validation::validate_vendor;
use bizbook_core::{new_id, CoreError, Entity, EntityKind, NewVendor, Vendor, VendorPatch};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

impl BusinessStore {
    pub fn add_vendor(&self, input: NewVendor) -> StoreResult<Vendor> {
        let vendor = input.into_vendor(new_id(), self.scope(), Utc::now());
        validate_vendor(&vendor)?;

        let mut state = self.begin()?;
        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Vendor(vendor.clone()));
        self.commit(state, batch);

        info!(vendor_id = %vendor.id, name = %vendor.name, "Vendor added");
        Ok(vendor)
    }

    pub fn update_vendor(&self, id: &str, patch: VendorPatch) -> StoreResult<Vendor> {
        let mut state = self.begin()?;
        let mut vendor = state
            .data
            .vendor(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Vendor, id))?;

        vendor.apply_patch(&patch);
        validate_vendor(&vendor)?;
        vendor.updated_at = Utc::now();

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Vendor(vendor.clone()));
        self.commit(state, batch);

        debug!(vendor_id = %id, "Vendor updated");
        Ok(vendor)
    }

    /// Fails with `ReferentialIntegrityViolation` while any expense
    /// references the vendor.
    pub fn delete_vendor(&self, id: &str) -> StoreResult<()> {
        let mut state = self.begin()?;
        if !state.data.contains(EntityKind::Vendor, id) {
            return Err(CoreError::not_found(EntityKind::Vendor, id).into());
        }

        let dependents = state
            .data
            .expenses
            .iter()
            .filter(|e| e.vendor_id.as_deref() == Some(id))
            .count();
        if dependents > 0 {
            return Err(CoreError::ReferentialIntegrityViolation {
                kind: EntityKind::Vendor,
                id: id.to_string(),
                dependent_kind: EntityKind::Expense,
                dependents,
            }
            .into());
        }

        let mut batch = ChangeBatch::default();
        batch.remove(&mut state.data, EntityKind::Vendor, id);
        self.commit(state, batch);

        info!(vendor_id = %id, "Vendor deleted");
        Ok(())
    }

    pub fn vendor(&self, id: &str) -> Option<Vendor> {
        self.with_data(|data| data.vendor(id).cloned())
    }

    pub fn vendors(&self) -> Vec<Vendor> {
        self.with_data(|data| data.vendors.clone())
    }

    pub fn search_vendors(&self, query: &str) -> Vec<Vendor> {
        self.with_data(|data| {
            search_vendors(&data.vendors, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;
    use bizbook_core::NewExpense;

    fn supplier() -> NewVendor {
        NewVendor {
            name: "Metro Wholesale".into(),
            contact_person: Some("Priya".into()),
            phone: "+91 98765-43210".into(),
            payment_terms_days: 30,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_vendor_guarded_by_expenses() {
        let store = ready_store().await;
        let vendor = store.add_vendor(supplier()).unwrap();
        let expense = store
            .add_expense(NewExpense {
                category: "Inventory".into(),
                amount_cents: 25_000,
                vendor_id: Some(vendor.id.clone()),
                ..Default::default()
            })
            .unwrap();

        let err = store.delete_vendor(&vendor.id).unwrap_err();
        assert!(err.is_referential_violation());
        assert!(store.vendor(&vendor.id).is_some());

        store.delete_expense(&expense.id).unwrap();
        store.delete_vendor(&vendor.id).unwrap();
        assert!(store.vendors().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_search_vendor() {
        let store = ready_store().await;
        let vendor = store.add_vendor(supplier()).unwrap();

        store
            .update_vendor(
                &vendor.id,
                VendorPatch {
                    contact_person: Some(String::new()),
                    payment_terms_days: Some(45),
                    ..Default::default()
                },
            )
            .unwrap();

        let stored = store.vendor(&vendor.id).unwrap();
        assert_eq!(stored.contact_person, None);
        assert_eq!(stored.payment_terms_days, 45);
        assert_eq!(store.search_vendors("metro").len(), 1);
        assert!(store.search_vendors("priya").is_empty());
    }
}
