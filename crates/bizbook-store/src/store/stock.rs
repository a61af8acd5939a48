//! Stock movements: the only path that changes on-hand quantity.

use chrono::Utc;
use tracing::info;

use bizbook_core::inventory::record_movement;
use bizbook_core::validation::validate_stock_movement;
use bizbook_core::{new_id, CoreError, Entity, EntityKind, NewStockMovement, StockMovement};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

impl BusinessStore {
    /// Records a movement and applies its signed delta to the product,
    /// clamping the quantity at zero.
    ///
    /// ## Errors
    /// - `Validation` for a non-positive in/out quantity or a zero adjustment
    /// - `NotFound` when the product is unknown
    pub fn add_stock_movement(&self, input: NewStockMovement) -> StoreResult<StockMovement> {
        validate_stock_movement(&input)?;
        let now = Utc::now();

        let mut state = self.begin()?;
        let mut product = state
            .data
            .product(&input.product_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Product, &input.product_id))?;

        let (movement, quantity) = record_movement(&product, input, new_id(), self.scope(), now);
        product.quantity = quantity;
        product.updated_at = now;

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::StockMovement(movement.clone()));
        batch.upsert(&mut state.data, Entity::Product(product));
        self.commit(state, batch);

        info!(
            product_id = %movement.product_id,
            kind = ?movement.kind,
            quantity = movement.quantity,
            before = movement.quantity_before,
            after = movement.quantity_after,
            "Stock movement recorded"
        );
        Ok(movement)
    }

    pub fn stock_movements(&self) -> Vec<StockMovement> {
        self.with_data(|data| data.stock_movements.clone())
    }

    /// Movements of one product, oldest first.
    pub fn stock_movements_for_product(&self, product_id: &str) -> Vec<StockMovement> {
        self.with_data(|data| {
            data.stock_movements
                .iter()
                .filter(|m| m.product_id == product_id)
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support::ready_store;
    use bizbook_core::{MovementKind, NewProduct};

    async fn store_with_widget(quantity: i64) -> (BusinessStore, String) {
        let store = ready_store().await;
        let product = store
            .add_product(NewProduct {
                name: "Widget".into(),
                sku: "WID-1".into(),
                price_cents: 1000,
                quantity,
                category: "General".into(),
                low_stock_threshold: 10,
                ..Default::default()
            })
            .unwrap();
        (store, product.id)
    }

    #[tokio::test]
    async fn test_stock_in_raises_quantity() {
        let (store, id) = store_with_widget(5).await;
        let movement = store
            .add_stock_movement(NewStockMovement::new(&id, MovementKind::In, 10))
            .unwrap();

        assert_eq!(movement.quantity_before, 5);
        assert_eq!(movement.quantity_after, 15);
        assert_eq!(movement.reason, "stock received");
        assert_eq!(store.product(&id).unwrap().quantity, 15);
        assert!(store.low_stock_products().is_empty());
    }

    #[tokio::test]
    async fn test_stock_out_clamps_at_zero() {
        let (store, id) = store_with_widget(3).await;
        store
            .add_stock_movement(NewStockMovement::new(&id, MovementKind::Out, 8).with_reason("damaged"))
            .unwrap();

        assert_eq!(store.product(&id).unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_signed_adjustment() {
        let (store, id) = store_with_widget(10).await;
        store
            .add_stock_movement(NewStockMovement::new(&id, MovementKind::Adjustment, -4))
            .unwrap();
        assert_eq!(store.product(&id).unwrap().quantity, 6);
    }

    #[tokio::test]
    async fn test_unknown_product_changes_nothing() {
        let (store, id) = store_with_widget(5).await;
        let before = store.snapshot();

        let err = store
            .add_stock_movement(NewStockMovement::new("missing", MovementKind::In, 1))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .add_stock_movement(NewStockMovement::new(&id, MovementKind::In, 0))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.snapshot(), before);
    }
}
