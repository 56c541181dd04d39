//! # Stock Ledger Vocabulary
//!
//! Every change to a product's stock counters is mirrored by exactly one
//! append-only movement. The cause of a movement is a tagged variant rather
//! than free text, so the ledger can be queried by source and reference.
//!
//! ```text
//! ┌──────────────────────┬──────┬───────────┬──────────────────────────┐
//! │ MovementReason       │ type │ pool      │ reference                │
//! ├──────────────────────┼──────┼───────────┼──────────────────────────┤
//! │ InitialStock         │ IN   │ any       │ -                        │
//! │ Sale                 │ OUT  │ SELLABLE  │ order id                 │
//! │ ReturnGood           │ IN   │ SELLABLE  │ return document id       │
//! │ ReturnDefective      │ IN   │ DEFECTIVE │ return document id       │
//! │ ManualAdjustment     │ ±    │ any       │ -  (free-text note)      │
//! └──────────────────────┴──────┴───────────┴──────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Movement Type
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    /// Sign applied to the movement quantity when folding the ledger.
    pub const fn sign(self) -> i64 {
        match self {
            MovementType::In => 1,
            MovementType::Out => -1,
        }
    }
}

// =============================================================================
// Stock Pool
// =============================================================================

/// Which product counter a movement affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockPool {
    /// `Product.sellable_stock`
    Sellable,
    /// `Product.defective_stock`
    Defective,
}

// =============================================================================
// Movement Source
// =============================================================================

/// Flat discriminant of [`MovementReason`], stored in the `source` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementSource {
    InitialStock,
    Sale,
    ReturnGood,
    ReturnDefective,
    ManualAdjustment,
}

// =============================================================================
// Movement Reason
// =============================================================================

/// Structured cause of a stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    InitialStock,
    Sale {
        #[serde(rename = "orderId")]
        order_id: String,
    },
    ReturnGood {
        #[serde(rename = "returnId")]
        return_id: String,
    },
    ReturnDefective {
        #[serde(rename = "returnId")]
        return_id: String,
    },
    ManualAdjustment { note: Option<String> },
}

impl MovementReason {
    /// Returns the flat source discriminant.
    pub fn source(&self) -> MovementSource {
        match self {
            MovementReason::InitialStock => MovementSource::InitialStock,
            MovementReason::Sale { .. } => MovementSource::Sale,
            MovementReason::ReturnGood { .. } => MovementSource::ReturnGood,
            MovementReason::ReturnDefective { .. } => MovementSource::ReturnDefective,
            MovementReason::ManualAdjustment { .. } => MovementSource::ManualAdjustment,
        }
    }

    /// Id of the document that caused the movement, if any.
    pub fn reference_id(&self) -> Option<&str> {
        match self {
            MovementReason::Sale { order_id } => Some(order_id),
            MovementReason::ReturnGood { return_id }
            | MovementReason::ReturnDefective { return_id } => Some(return_id),
            MovementReason::InitialStock | MovementReason::ManualAdjustment { .. } => None,
        }
    }

    /// Free-text note, only carried by manual adjustments.
    pub fn note(&self) -> Option<&str> {
        match self {
            MovementReason::ManualAdjustment { note } => note.as_deref(),
            _ => None,
        }
    }

    /// Human-readable label shown in stock history screens.
    ///
    /// ```rust
    /// use kassa_core::ledger::MovementReason;
    ///
    /// let reason = MovementReason::Sale {
    ///     order_id: "3f2a9c1e-0000-4000-8000-000000000000".to_string(),
    /// };
    /// assert_eq!(reason.label(), "sale #3f2a9c1e");
    /// ```
    pub fn label(&self) -> String {
        match self {
            MovementReason::InitialStock => "initial stock".to_string(),
            MovementReason::Sale { order_id } => {
                let prefix: String = order_id.chars().take(8).collect();
                format!("sale #{}", prefix)
            }
            MovementReason::ReturnGood { .. } => "return to stock".to_string(),
            MovementReason::ReturnDefective { .. } => "return as defective".to_string(),
            MovementReason::ManualAdjustment { note: Some(note) } => {
                format!("manual adjustment: {}", note)
            }
            MovementReason::ManualAdjustment { note: None } => "manual adjustment".to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
