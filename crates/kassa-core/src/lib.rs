//! # kassa-core: Pure Business Logic for Kassa
//!
//! This crate holds every rule of the order-commit and return-commit flows
//! that can be decided without touching storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kassa Architecture                             │
//! │                                                                         │
//! │  Order-entry UI / Return-entry UI                                      │
//! │           │  OrderRequest / ReturnRequest                               │
//! │  ┌────────▼────────────────────────────────────────────────────────┐   │
//! │  │               ★ kassa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │  money  │ │  order  │ │ returns │ │ ledger  │  │   │
//! │  │   │ Product │ │  Money  │ │OrderPlan│ │ReturnPln│ │ Reason  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plans                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         kassa-db (repositories + atomic commit services)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Order, ReturnDocument, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types and the error-kind taxonomy
//! - [`validation`] - Field-level input validation
//! - [`order`] - Cart pricing, payment split and credit decision
//! - [`returns`] - Return validation and disposition routing
//! - [`ledger`] - Structured stock-movement reasons
//! - [`numbering`] - Human-readable document numbers
//!
//! ## Example Usage
//!
//! ```rust
//! use kassa_core::money::Money;
//!
//! let price = Money::from_cents(1000); // 10.00
//! let line_total = price.multiply_quantity(5);
//! assert_eq!(line_total.cents(), 5000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod numbering;
pub mod order;
pub mod returns;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ledger::{MovementReason, MovementSource, MovementType, StockPool};
pub use money::Money;
pub use numbering::DocumentSeries;
pub use order::{check_credit, plan_order, OrderPlan, PlannedLine, StockDemand};
pub use returns::{
    check_returnable, invoiced_quantity, plan_return, PlannedReturnLine, ReturnPlan, StockEffect,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart or return request.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Guards against typing 1000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 999;
