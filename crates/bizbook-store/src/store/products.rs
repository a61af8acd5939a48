//! Product catalogue operations.

use chrono::Utc;
use tracing::{debug, info};

use bizbook_core::inventory::{manual_adjustment, opening_movement, record_movement};
use bizbook_core::query::{low_stock, search_products};
use bizbook_core::validation::validate_product;
use bizbook_core::{
    new_id, BusinessData, CoreError, Entity, EntityKind, NewProduct, Product, ProductPatch,
    ValidationError,
};

use super::{BusinessStore, ChangeBatch};
use crate::error::StoreResult;

/// SKUs are unique per owner, compared case-insensitively.
fn ensure_unique_sku(data: &BusinessData, sku: &str, except_id: Option<&str>) -> StoreResult<()> {
    let taken = data
        .products
        .iter()
        .any(|p| Some(p.id.as_str()) != except_id && p.sku.eq_ignore_ascii_case(sku));
    if taken {
        return Err(ValidationError::Duplicate {
            field: "sku".to_string(),
            value: sku.to_string(),
        }
        .into());
    }
    Ok(())
}

impl BusinessStore {
    /// Adds a product. A non-zero starting quantity is booked as an
    /// "opening stock" movement.
    pub fn add_product(&self, input: NewProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let scope = self.scope().clone();
        let product = input.into_product(new_id(), &scope, now);
        validate_product(&product)?;

        let mut state = self.begin()?;
        ensure_unique_sku(&state.data, &product.sku, None)?;

        let mut batch = ChangeBatch::default();
        batch.upsert(&mut state.data, Entity::Product(product.clone()));
        if let Some(movement) = opening_movement(&product, new_id(), &scope, now) {
            batch.upsert(&mut state.data, Entity::StockMovement(movement));
        }
        self.commit(state, batch);

        info!(product_id = %product.id, sku = %product.sku, quantity = product.quantity, "Product added");
        Ok(product)
    }

    /// Merges `patch` into the product.
    ///
    /// A changed `quantity` is recorded as a "manual adjustment" movement
    /// rather than written directly.
    pub fn update_product(&self, id: &str, patch: ProductPatch) -> StoreResult<Product> {
        let now = Utc::now();
        let mut state = self.begin()?;
        let original = state
            .data
            .product(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Product, id))?;

        let mut product = original.clone();
        product.apply_patch(&patch);
        if let Some(quantity) = patch.quantity {
            product.quantity = quantity;
        }
        validate_product(&product)?;
        ensure_unique_sku(&state.data, &product.sku, Some(id))?;

        let mut batch = ChangeBatch::default();
        if let Some(adjustment) = manual_adjustment(id, original.quantity, product.quantity) {
            let (movement, quantity) =
                record_movement(&original, adjustment, new_id(), self.scope(), now);
            product.quantity = quantity;
            batch.upsert(&mut state.data, Entity::StockMovement(movement));
        }
        product.updated_at = now;
        batch.upsert(&mut state.data, Entity::Product(product.clone()));
        self.commit(state, batch);

        debug!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Removes the product. Invoice lines and stock movements keep their
    /// snapshots of it.
    pub fn delete_product(&self, id: &str) -> StoreResult<()> {
        let mut state = self.begin()?;
        if !state.data.contains(EntityKind::Product, id) {
            return Err(CoreError::not_found(EntityKind::Product, id).into());
        }

        let mut batch = ChangeBatch::default();
        batch.remove(&mut state.data, EntityKind::Product, id);
        self.commit(state, batch);

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.with_data(|data| data.product(id).cloned())
    }

    pub fn products(&self) -> Vec<Product> {
        self.with_data(|data| data.products.clone())
    }

    /// Case-insensitive match on name, SKU, category or barcode.
    pub fn search_products(&self, query: &str) -> Vec<Product> {
        self.with_data(|data| {
            search_products(&data.products, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Products at or below their low-stock threshold.
    pub fn low_stock_products(&self) -> Vec<Product> {
        self.with_data(|data| low_stock(&data.products).into_iter().cloned().collect())
    }
}
