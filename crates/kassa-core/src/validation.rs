//! # Validation Module
//!
//! Field-level input validation for Kassa.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE - field formats and ranges                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: order / returns planners - cross-entity business rules       │
//! │           │   (stock sufficiency, credit limit, invoiced quantity)      │
//! │           ▼                                                             │
//! │  Layer 3: SQLite - CHECK / FOREIGN KEY / UNIQUE constraints and        │
//! │           conditional updates inside the commit transaction            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text notes and return reasons.
pub const MAX_NOTE_LENGTH: usize = 500;

/// Largest opening stock or single manual adjustment, in units.
pub const MAX_STOCK_CHANGE: i64 = 1_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use kassa_core::validation::validate_sku;
///
/// assert!(validate_sku("WIDGET-1").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product or customer).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an optional free-text field (order notes, return reason).
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(text) if text.len() > MAX_NOTE_LENGTH => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
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

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use kassa_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a credit limit in cents (>= 0).
pub fn validate_credit_limit_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "credit limit".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an opening stock level (0..=MAX_STOCK_CHANGE).
pub fn validate_initial_stock(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK_CHANGE).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "initial stock".to_string(),
            min: 0,
            max: MAX_STOCK_CHANGE,
        });
    }

    Ok(())
}

/// Validates a manual stock adjustment.
///
/// ## Rules
/// - Non-zero
/// - Magnitude at most MAX_STOCK_CHANGE in either direction
///
/// ```rust
/// use kassa_core::validation::{validate_stock_adjustment, MAX_STOCK_CHANGE};
///
/// assert!(validate_stock_adjustment(-3).is_ok());
/// assert!(validate_stock_adjustment(0).is_err());
/// assert!(validate_stock_adjustment(MAX_STOCK_CHANGE + 1).is_err());
/// assert!(validate_stock_adjustment(i64::MIN).is_err());
/// ```
pub fn validate_stock_adjustment(delta: i64) -> ValidationResult<()> {
    if delta == 0 || !(-MAX_STOCK_CHANGE..=MAX_STOCK_CHANGE).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "stock adjustment".to_string(),
            min: -MAX_STOCK_CHANGE,
            max: MAX_STOCK_CHANGE,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a cart or return request.
///
/// ## Rules
/// - At least one line
/// - At most MAX_CART_ITEMS (100)
pub fn validate_line_count(field: &str, lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
