//! # Error Types
//!
//! Domain-specific error types for kassa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kassa-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Caller-facing taxonomy                         │
//! │                                                                         │
//! │  kassa-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CommitError      - Rejected / Conflict / Storage                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CommitError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, amounts)
//! 3. Errors are enum variants, never String
//! 4. Every error maps onto exactly one [`ErrorKind`]

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing classification of every failure a commit can produce.
///
/// Validation kinds are returned before any mutation and are never retried
/// automatically. `ConflictRetryable` and `StorageFailure` mean the commit did
/// not happen; the caller may resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    InsufficientStock,
    CustomerBlocked,
    CreditLimitExceeded,
    ConflictRetryable,
    StorageFailure,
}

impl ErrorKind {
    /// Whether resubmitting the same request can succeed.
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ConflictRetryable | ErrorKind::StorageFailure)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations detected while planning a
/// commit, or re-detected by a conditional update inside the commit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Request breaks a rule: empty cart, credit sale without customer,
    /// cash-type payment not matching total, return beyond invoiced quantity.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Product id does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer id does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Referenced order / document does not exist.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Insufficient sellable stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Order line (qty: 6)
    ///      │
    ///      ▼
    /// Check stock: sellable=5
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "WIDGET-1", available: 5, requested: 6 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Customer account is flagged as blocked.
    #[error("Customer {customer_id} is blocked")]
    CustomerBlocked { customer_id: String },

    /// Commit would push `creditUsed` past `creditLimit`.
    #[error(
        "Credit limit exceeded for customer {customer_id}: limit {limit}, used {used}, requested {requested}"
    )]
    CreditLimitExceeded {
        customer_id: String,
        limit: Money,
        used: Money,
        requested: Money,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidRequest error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidRequest { .. } | CoreError::Validation(_) => {
                ErrorKind::InvalidRequest
            }
            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::DocumentNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::CustomerBlocked { .. } => ErrorKind::CustomerBlocked,
            CoreError::CreditLimitExceeded { .. } => ErrorKind::CreditLimitExceeded,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "WIDGET-1".to_string(),
            available: 5,
            requested: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for WIDGET-1: available 5, requested 6"
        );

        let err = CoreError::CreditLimitExceeded {
            customer_id: "c-1".to_string(),
            limit: Money::from_cents(10000),
            used: Money::from_cents(8000),
            requested: Money::from_cents(2500),
        };
        assert_eq!(
            err.to_string(),
            "Credit limit exceeded for customer c-1: limit 100.00, used 80.00, requested 25.00"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(CoreError::invalid("empty cart").kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            CoreError::DocumentNotFound("d".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::CustomerBlocked {
                customer_id: "c".into()
            }
            .kind(),
            ErrorKind::CustomerBlocked
        );

        let validation: CoreError = ValidationError::Required {
            field: "items".to_string(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::ConflictRetryable.is_retryable());
        assert!(ErrorKind::StorageFailure.is_retryable());
        assert!(!ErrorKind::InsufficientStock.is_retryable());
        assert!(!ErrorKind::InvalidRequest.is_retryable());
    }
}
