//! Products and the stock movements that change their quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{clean_optional_text, merge, merge_optional_text, Scope, TaxRate};
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// Unit of measure a product is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductUnit {
    #[default]
    Piece,
    Box,
    SquareFeet,
    SquareMeter,
}

/// A product kept in stock and sold on invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Scope this product belongs to.
    pub owner_id: String,

    pub name: String,

    /// Stock Keeping Unit, unique per owner.
    pub sku: String,

    /// Selling price in minor units.
    pub price_cents: i64,

    /// Purchase cost in minor units (for margin reporting).
    pub cost_cents: Option<i64>,

    /// On-hand quantity. Never negative.
    pub quantity: i64,

    pub category: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Low-stock when `quantity <= low_stock_threshold`.
    pub low_stock_threshold: i64,

    pub unit: ProductUnit,
    pub pieces_per_box: Option<i64>,
    pub area_per_piece: Option<f64>,
    pub description: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub manufacturer: Option<String>,

    /// Per-product tax rate; invoices fall back to their own rate when unset.
    pub tax_rate_bps: Option<u32>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the product's own tax rate, if it has one.
    #[inline]
    pub fn tax_rate(&self) -> Option<TaxRate> {
        self.tax_rate_bps.map(TaxRate::from_bps)
    }

    /// `quantity <= low_stock_threshold`.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    #[inline]
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    /// Selling value of the units on hand.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }

    /// Applies every patched field except `quantity`.
    ///
    /// Quantity changes are routed through a stock movement by the caller so
    /// that the audit trail stays complete.
    pub fn apply_patch(&mut self, patch: &ProductPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(sku) = &patch.sku {
            self.sku = sku.trim().to_string();
        }
        merge(&mut self.price_cents, &patch.price_cents);
        if patch.cost_cents.is_some() {
            self.cost_cents = patch.cost_cents;
        }
        if let Some(category) = &patch.category {
            self.category = category.trim().to_string();
        }
        merge_optional_text(&mut self.barcode, &patch.barcode);
        merge(&mut self.low_stock_threshold, &patch.low_stock_threshold);
        merge(&mut self.unit, &patch.unit);
        if patch.pieces_per_box.is_some() {
            self.pieces_per_box = patch.pieces_per_box;
        }
        if patch.area_per_piece.is_some() {
            self.area_per_piece = patch.area_per_piece;
        }
        merge_optional_text(&mut self.description, &patch.description);
        merge_optional_text(&mut self.material, &patch.material);
        merge_optional_text(&mut self.color, &patch.color);
        merge_optional_text(&mut self.manufacturer, &patch.manufacturer);
        if patch.tax_rate_bps.is_some() {
            self.tax_rate_bps = patch.tax_rate_bps;
        }
    }
}

/// Fields for `add_product`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    pub quantity: i64,
    pub category: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub unit: ProductUnit,
    #[serde(default)]
    pub pieces_per_box: Option<i64>,
    #[serde(default)]
    pub area_per_piece: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub tax_rate_bps: Option<u32>,
}

impl NewProduct {
    /// Builds the entity with the given identity and creation time.
    pub fn into_product(self, id: String, owner: &Scope, now: DateTime<Utc>) -> Product {
        Product {
            id,
            owner_id: owner.as_str().to_string(),
            name: self.name.trim().to_string(),
            sku: self.sku.trim().to_string(),
            price_cents: self.price_cents,
            cost_cents: self.cost_cents,
            quantity: self.quantity,
            category: self.category.trim().to_string(),
            barcode: clean_optional_text(self.barcode),
            low_stock_threshold: self.low_stock_threshold,
            unit: self.unit,
            pieces_per_box: self.pieces_per_box,
            area_per_piece: self.area_per_piece,
            description: clean_optional_text(self.description),
            material: clean_optional_text(self.material),
            color: clean_optional_text(self.color),
            manufacturer: clean_optional_text(self.manufacturer),
            tax_rate_bps: self.tax_rate_bps,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for `update_product`.
///
/// Optional text fields are cleared by patching them with an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<i64>,
    /// Direct quantity edit; recorded as an adjustment movement.
    pub quantity: Option<i64>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub unit: Option<ProductUnit>,
    pub pieces_per_box: Option<i64>,
    pub area_per_piece: Option<f64>,
    pub description: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub manufacturer: Option<String>,
    pub tax_rate_bps: Option<u32>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received: `+quantity`.
    In,
    /// Goods issued: `-quantity`.
    Out,
    /// Correction: `quantity` is a signed delta.
    Adjustment,
}

/// An append-only record of a change to a product's quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub owner_id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Positive for in/out, signed for adjustment.
    pub quantity: i64,
    pub reason: String,
    pub reference: Option<String>,
    /// Product quantity before the movement was applied.
    pub quantity_before: i64,
    /// Product quantity after clamping at zero.
    pub quantity_after: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fields for `add_stock_movement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStockMovement {
    pub product_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl NewStockMovement {
    pub fn new(product_id: impl Into<String>, kind: MovementKind, quantity: i64) -> Self {
        NewStockMovement {
            product_id: product_id.into(),
            kind,
            quantity,
            reason: String::new(),
            reference: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Product {
        NewProduct {
            name: " Widget ".into(),
            sku: "WID-1".into(),
            price_cents: 1000,
            quantity: 5,
            category: "Tools".into(),
            low_stock_threshold: 10,
            barcode: Some("  ".into()),
            ..Default::default()
        }
        .into_product("p-1".into(), &Scope::new("owner"), Utc::now())
    }

    #[test]
    fn test_into_product_trims_and_tags_owner() {
        let p = widget();
        assert_eq!(p.name, "Widget");
        assert_eq!(p.owner_id, "owner");
        assert_eq!(p.barcode, None);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn test_low_stock_is_inclusive() {
        let mut p = widget();
        assert!(p.is_low_stock());
        p.quantity = 10;
        assert!(p.is_low_stock());
        p.quantity = 11;
        assert!(!p.is_low_stock());
    }

    #[test]
    fn test_apply_patch_ignores_quantity() {
        let mut p = widget();
        p.apply_patch(&ProductPatch {
            price_cents: Some(1200),
            quantity: Some(99),
            color: Some("Red".into()),
            ..Default::default()
        });
        assert_eq!(p.price_cents, 1200);
        assert_eq!(p.quantity, 5);
        assert_eq!(p.color.as_deref(), Some("Red"));
        assert_eq!(p.stock_value().cents(), 6000);
    }
}
