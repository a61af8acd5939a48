//! # Validation Module
//!
//! Input validation for BizBook mutations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation (forms)                                         │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business Store mutation                                      │
//! │  ├── THIS MODULE: field rules on the merged entity                     │
//! │  └── Cross-entity checks (SKU uniqueness, references)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Nothing is mutated or written until every check has passed            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entity validators run on the fully merged entity, so `add_x` and
//! `update_x` share one rule set.

use crate::error::ValidationError;
use crate::types::{Customer, Expense, MovementKind, NewStockMovement, Product, Vendor};
use crate::{MAX_INVOICE_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MAX_TEXT_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max` characters
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores, slashes and dots only
///
/// ## Example
/// ```rust
/// use bizbook_core::validation::validate_sku;
///
/// assert!(validate_sku("WH001").is_ok());
/// assert!(validate_sku("TILE-60/60").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_required_text("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '/' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address loosely: one `@`, non-empty local part, and a
/// dotted domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Digits plus `+ - ( )` and spaces
/// - Between 7 and 15 digits
///
/// ## Example
/// ```rust
/// use bizbook_core::validation::validate_phone;
///
/// assert!(validate_phone("+1234567890").is_ok());
/// assert!(validate_phone("+91 98765-43210").is_ok());
/// assert!(validate_phone("call me").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '))
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+', '-', '(' and ')'".to_string(),
        });
    }

    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain between 7 and 15 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (matches everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed, lowercased query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_lowercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a positive line / movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a field that may be zero but never negative.
///
/// ## Example
/// ```rust
/// use bizbook_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price", 1099).is_ok());
/// assert!(validate_non_negative("price", 0).is_ok());
/// assert!(validate_non_negative("price", -100).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a price-like amount in minor units.
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed MAX_PRICE_CENTS
///
/// ## Example
/// ```rust
/// use bizbook_core::validation::validate_amount;
/// use bizbook_core::MAX_PRICE_CENTS;
///
/// assert!(validate_amount("price", 1099).is_ok());
/// assert!(validate_amount("price", MAX_PRICE_CENTS + 1).is_err());
/// ```
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    validate_non_negative(field, cents)?;

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in minor units.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_PRICE_CENTS
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    validate_amount("payment amount", cents)
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates the number of lines on an invoice.
pub fn validate_invoice_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_INVOICE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_INVOICE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_required_text("name", &product.name, MAX_TEXT_LENGTH)?;
    validate_sku(&product.sku)?;
    validate_required_text("category", &product.category, MAX_TEXT_LENGTH)?;
    validate_amount("price", product.price_cents)?;
    if let Some(cost) = product.cost_cents {
        validate_amount("cost", cost)?;
    }
    validate_non_negative("quantity", product.quantity)?;
    validate_non_negative("low_stock_threshold", product.low_stock_threshold)?;
    if let Some(pieces) = product.pieces_per_box {
        if pieces <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "pieces_per_box".to_string(),
            });
        }
    }
    if let Some(area) = product.area_per_piece {
        if !area.is_finite() || area <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "area_per_piece".to_string(),
            });
        }
    }
    if let Some(bps) = product.tax_rate_bps {
        validate_tax_rate_bps(bps)?;
    }
    Ok(())
}

pub fn validate_customer(customer: &Customer) -> ValidationResult<()> {
    validate_required_text("name", &customer.name, MAX_TEXT_LENGTH)?;
    validate_phone(&customer.phone)?;
    if let Some(email) = &customer.email {
        validate_email(email)?;
    }
    validate_non_negative("credit_limit", customer.credit_limit_cents)?;
    validate_non_negative("loyalty_points", customer.loyalty_points)?;
    Ok(())
}

pub fn validate_vendor(vendor: &Vendor) -> ValidationResult<()> {
    validate_required_text("name", &vendor.name, MAX_TEXT_LENGTH)?;
    validate_phone(&vendor.phone)?;
    if let Some(email) = &vendor.email {
        validate_email(email)?;
    }
    Ok(())
}

pub fn validate_expense(expense: &Expense) -> ValidationResult<()> {
    validate_required_text("category", &expense.category, MAX_TEXT_LENGTH)?;
    if expense.amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    validate_amount("amount", expense.amount_cents)
}

/// In/out movements take a positive quantity; adjustments a non-zero signed one.
pub fn validate_stock_movement(movement: &NewStockMovement) -> ValidationResult<()> {
    match movement.kind {
        MovementKind::In | MovementKind::Out => validate_quantity(movement.quantity),
        MovementKind::Adjustment => {
            if movement.quantity == 0 {
                return Err(ValidationError::Required {
                    field: "quantity".to_string(),
                });
            }
            validate_quantity(movement.quantity.abs())
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("WH001").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("john.smith@email.com").is_ok());
        assert!(validate_email("john").is_err());
        assert!(validate_email("@email.com").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a@@b.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+1987654321").is_ok());
        assert!(validate_phone("(555) 123-4567").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("555-CALL-NOW").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", 0).is_ok());
        assert!(validate_amount("price", MAX_PRICE_CENTS).is_ok());
        assert!(matches!(
            validate_amount("price", MAX_PRICE_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_amount("price", -1),
            Err(ValidationError::Negative { .. })
        ));
        assert!(validate_payment_amount(MAX_PRICE_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_stock_movement() {
        let ok = NewStockMovement::new("p", MovementKind::Adjustment, -3);
        assert!(validate_stock_movement(&ok).is_ok());

        let zero = NewStockMovement::new("p", MovementKind::Adjustment, 0);
        assert!(validate_stock_movement(&zero).is_err());

        let negative_in = NewStockMovement::new("p", MovementKind::In, -3);
        assert!(validate_stock_movement(&negative_in).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  Mug ").unwrap(), "mug");
        assert!(validate_search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1800).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_invoice_item_count() {
        assert!(validate_invoice_item_count(0).is_err());
        assert!(validate_invoice_item_count(1).is_ok());
        assert!(validate_invoice_item_count(MAX_INVOICE_ITEMS + 1).is_err());
    }
}
