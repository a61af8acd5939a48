//! # Inventory Arithmetic
//!
//! Stock movements are the only path that changes a product's quantity.
//!
//! ```text
//!   In(q)          ──►  delta = +q
//!   Out(q)         ──►  delta = -q
//!   Adjustment(d)  ──►  delta =  d   (signed)
//!
//!   quantity_after = max(0, quantity_before + delta)
//! ```

use chrono::{DateTime, Utc};

use crate::types::{MovementKind, NewStockMovement, Product, Scope, StockMovement};

/// Reason recorded on movements synthesized from a direct quantity edit.
pub const MANUAL_ADJUSTMENT_REASON: &str = "manual adjustment";

/// Reason recorded on the movement that books a new product's starting stock.
pub const OPENING_STOCK_REASON: &str = "opening stock";

/// Signed change a movement applies to the on-hand quantity.
pub fn signed_delta(kind: MovementKind, quantity: i64) -> i64 {
    match kind {
        MovementKind::In => quantity,
        MovementKind::Out => -quantity,
        MovementKind::Adjustment => quantity,
    }
}

/// New quantity after applying `delta`, clamped at zero.
pub fn apply_delta(current: i64, delta: i64) -> i64 {
    current.saturating_add(delta).max(0)
}

fn default_reason(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::In => "stock received",
        MovementKind::Out => "stock issued",
        MovementKind::Adjustment => "stock adjustment",
    }
}

/// Builds the movement record for `product` and returns it together with
/// the product's new quantity.
pub fn record_movement(
    product: &Product,
    input: NewStockMovement,
    id: String,
    owner: &Scope,
    now: DateTime<Utc>,
) -> (StockMovement, i64) {
    let before = product.quantity;
    let after = apply_delta(before, signed_delta(input.kind, input.quantity));
    let reason = match input.reason.trim() {
        "" => default_reason(input.kind).to_string(),
        reason => reason.to_string(),
    };

    let movement = StockMovement {
        id,
        owner_id: owner.as_str().to_string(),
        product_id: product.id.clone(),
        kind: input.kind,
        quantity: input.quantity,
        reason,
        reference: input
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        quantity_before: before,
        quantity_after: after,
        created_at: now,
    };
    (movement, after)
}

/// Compensating adjustment for a direct quantity edit, or `None` when the
/// quantity does not change.
pub fn manual_adjustment(product_id: &str, from: i64, to: i64) -> Option<NewStockMovement> {
    (from != to).then(|| {
        NewStockMovement::new(product_id, MovementKind::Adjustment, to - from)
            .with_reason(MANUAL_ADJUSTMENT_REASON)
    })
}

/// `In` movement from zero to the quantity a product was created with, or
/// `None` when it starts empty.
pub fn opening_movement(
    product: &Product,
    id: String,
    owner: &Scope,
    now: DateTime<Utc>,
) -> Option<StockMovement> {
    (product.quantity > 0).then(|| StockMovement {
        id,
        owner_id: owner.as_str().to_string(),
        product_id: product.id.clone(),
        kind: MovementKind::In,
        quantity: product.quantity,
        reason: OPENING_STOCK_REASON.to_string(),
        reference: None,
        quantity_before: 0,
        quantity_after: product.quantity,
        created_at: now,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewProduct;
    use proptest::prelude::*;

    fn product(quantity: i64) -> Product {
        NewProduct {
            name: "Widget".to_string(),
            sku: "W-1".to_string(),
            price_cents: 1000,
            quantity,
            category: "General".to_string(),
            low_stock_threshold: 10,
            ..Default::default()
        }
        .into_product("p1".to_string(), &Scope::new("owner"), Utc::now())
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(MovementKind::In, 5), 5);
        assert_eq!(signed_delta(MovementKind::Out, 5), -5);
        assert_eq!(signed_delta(MovementKind::Adjustment, -3), -3);
    }

    #[test]
    fn test_stock_in_lifts_quantity() {
        let p = product(5);
        let input = NewStockMovement::new("p1", MovementKind::In, 10);
        let (movement, after) = record_movement(&p, input, "m1".into(), &Scope::new("owner"), Utc::now());
        assert_eq!(after, 15);
        assert_eq!(movement.quantity_before, 5);
        assert_eq!(movement.quantity_after, 15);
        assert_eq!(movement.reason, "stock received");
    }

    #[test]
    fn test_stock_out_clamps_at_zero() {
        let p = product(3);
        let input = NewStockMovement::new("p1", MovementKind::Out, 10).with_reason("damaged");
        let (movement, after) = record_movement(&p, input, "m1".into(), &Scope::new("owner"), Utc::now());
        assert_eq!(after, 0);
        assert_eq!(movement.reason, "damaged");
    }

    #[test]
    fn test_manual_adjustment() {
        assert!(manual_adjustment("p1", 5, 5).is_none());

        let adj = manual_adjustment("p1", 5, 2).unwrap();
        assert_eq!(adj.kind, MovementKind::Adjustment);
        assert_eq!(adj.quantity, -3);
        assert_eq!(adj.reason, MANUAL_ADJUSTMENT_REASON);
    }

    #[test]
    fn test_opening_movement() {
        assert!(opening_movement(&product(0), "m0".into(), &Scope::new("owner"), Utc::now()).is_none());

        let m = opening_movement(&product(12), "m1".into(), &Scope::new("owner"), Utc::now()).unwrap();
        assert_eq!(m.kind, MovementKind::In);
        assert_eq!((m.quantity_before, m.quantity_after), (0, 12));
        assert_eq!(m.reason, OPENING_STOCK_REASON);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn prop_stock_never_negative(
            start in 0i64..1_000i64,
            moves in prop::collection::vec((0u8..3u8, -500i64..500i64), 1..30),
        ) {
            let mut p = product(start);
            for (kind, qty) in moves {
                let (kind, qty) = match kind {
                    0 => (MovementKind::In, qty.abs().max(1)),
                    1 => (MovementKind::Out, qty.abs().max(1)),
                    _ => (MovementKind::Adjustment, qty),
                };
                let before = p.quantity;
                let input = NewStockMovement::new("p1", kind, qty);
                let (movement, after) =
                    record_movement(&p, input, "m".into(), &Scope::new("owner"), Utc::now());

                prop_assert!(after >= 0);
                prop_assert_eq!(after, (before + signed_delta(kind, qty)).max(0));
                prop_assert_eq!(movement.quantity_after, after);
                p.quantity = after;
            }
        }
    }
}
