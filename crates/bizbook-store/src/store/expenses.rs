//! Expense operations.

use chrono::Utc;
use tracing::{debug, info};

use bizbook_core::validation::validate_expense;
use bizbook_core::{
    new_id, BusinessData, CoreError, Entity, EntityKind, Expense, ExpensePatch, NewExpense,
};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

fn ensure_vendor(data: &BusinessData, expense: &Expense) -> StoreResult<()> {
    match &expense.vendor_id {
        Some(vendor_id) if data.vendor(vendor_id).is_none() => {
            Err(CoreError::not_found(EntityKind::Vendor, vendor_id).into())
        }
        _ => Ok(()),
    }
}

impl BusinessStore {
    /// Records an expense. `date` defaults to now.
    pub fn add_expense(&self, input: NewExpense) -> StoreResult<Expense> {
        let expense = input.into_expense(new_id(), self.scope(), Utc::now());
        validate_expense(&expense)?;

        let mut state = self.begin()?;
        ensure_vendor(&state.data, &expense)?;

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Expense(expense.clone()));
        self.commit(state, batch);

        info!(
            expense_id = %expense.id,
            category = %expense.category,
            amount_cents = expense.amount_cents,
            "Expense recorded"
        );
        Ok(expense)
    }

    pub fn update_expense(&self, id: &str, patch: ExpensePatch) -> StoreResult<Expense> {
        let mut state = self.begin()?;
        let mut expense = state
            .data
            .expense(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Expense, id))?;

        expense.apply_patch(&patch);
        validate_expense(&expense)?;
        ensure_vendor(&state.data, &expense)?;
        expense.updated_at = Utc::now();

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Expense(expense.clone()));
        self.commit(state, batch);

        debug!(expense_id = %id, "Expense updated");
        Ok(expense)
    }

    pub fn delete_expense(&self, id: &str) -> StoreResult<()> {
        let mut state = self.begin()?;
        if !state.data.contains(EntityKind::Expense, id) {
            return Err(CoreError::not_found(EntityKind::Expense, id).into());
        }

        let mut batch = ChangeBatch::default();
        batch.remove(&mut state.data, EntityKind::Expense, id);
        self.commit(state, batch);

        info!(expense_id = %id, "Expense deleted");
        Ok(())
    }

    pub fn expense(&self, id: &str) -> Option<Expense> {
        self.with_data(|data| data.expense(id).cloned())
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.with_data(|data| data.expenses.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;

    fn rent() -> NewExpense {
        NewExpense {
            category: "Rent".into(),
            description: "October rent".into(),
            amount_cents: 120_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_expense_defaults_date_to_now() {
        let store = ready_store().await;
        let expense = store.add_expense(rent()).unwrap();
        assert_eq!(expense.date, expense.created_at);
        assert_eq!(store.expenses().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let store = ready_store().await;
        let mut input = rent();
        input.amount_cents = 0;
        assert!(store.add_expense(input).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_unknown_vendor_rejected() {
        let store = ready_store().await;
        let mut input = rent();
        input.vendor_id = Some("missing".into());
        assert!(store.add_expense(input).unwrap_err().is_not_found());

        let expense = store.add_expense(rent()).unwrap();
        let err = store
            .update_expense(
                &expense.id,
                ExpensePatch {
                    vendor_id: Some("missing".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.expense(&expense.id).unwrap().vendor_id, None);
    }

    #[tokio::test]
    async fn test_update_amount() {
        let store = ready_store().await;
        let expense = store.add_expense(rent()).unwrap();
        let updated = store
            .update_expense(
                &expense.id,
                ExpensePatch {
                    amount_cents: Some(125_000),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.amount_cents, 125_000);
        assert_eq!(updated.category, "Rent");
    }
}
