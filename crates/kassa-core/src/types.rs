//! # Domain Types
//!
//! Core domain types used throughout Kassa.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Customer     │   │      Order      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku            │   │  credit_limit   │   │  order_number   │       │
//! │  │  unit_price     │   │  credit_used    │   │  total / paid   │       │
//! │  │  sellable_stock │   │  is_blocked     │   │  credit_amount  │       │
//! │  │  defective_stock│   └─────────────────┘   │  status         │       │
//! │  └─────────────────┘                         └────────┬────────┘       │
//! │                                                       │ 1..n            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │  StockMovement  │   │ ReturnDocument  │──►│    OrderLine    │       │
//! │  │  (append-only)  │   │  ReturnLine     │   │  (snapshot)     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number, return_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::{MovementSource, MovementType, StockPool};
use crate::money::Money;
use crate::returns::StockEffect;

// =============================================================================
// Acting User
// =============================================================================

/// The seller / clerk performing a commit.
///
/// Supplied by the identity collaborator; this crate never authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// Stock counters are only ever changed together with a stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Catalog price in cents.
    pub unit_price_cents: i64,

    /// Quantity available for sale. Never negative.
    pub sellable_stock: i64,

    /// Quantity returned defective, held apart from sellable stock.
    pub defective_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the catalog price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Checks if `quantity` units can be sold from sellable stock.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.sellable_stock >= quantity
    }
}

/// Input for creating a catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    /// Opening sellable stock, recorded as an `INITIAL_STOCK` movement.
    #[serde(default)]
    pub initial_stock: i64,
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer with a credit account.
///
/// Invariant: `0 <= credit_used_cents <= credit_limit_cents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub credit_limit_cents: i64,
    pub credit_used_cents: i64,
    /// Blocked customers cannot take on new credit.
    pub is_blocked: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn credit_limit(&self) -> Money {
        Money::from_cents(self.credit_limit_cents)
    }

    #[inline]
    pub fn credit_used(&self) -> Money {
        Money::from_cents(self.credit_used_cents)
    }

    /// Credit still available before hitting the limit.
    #[inline]
    pub fn available_credit(&self) -> Money {
        self.credit_limit() - self.credit_used()
    }
}

/// Input for registering a customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub credit_limit_cents: i64,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    /// Customer pays part now; the rest goes on their credit account.
    Credit,
}

impl PaymentMethod {
    #[inline]
    pub const fn is_credit(self) -> bool {
        matches!(self, PaymentMethod::Credit)
    }
}

// =============================================================================
// Order Status / Document Type
// =============================================================================

/// Status of a committed order.
///
/// `Pending` iff part of the total was put on credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Completed,
    Pending,
}

impl OrderStatus {
    /// Derives the status from the credit portion of an order.
    #[inline]
    pub fn for_credit_amount(credit: Money) -> Self {
        if credit.is_positive() {
            OrderStatus::Pending
        } else {
            OrderStatus::Completed
        }
    }
}

/// Kind of document issued for an order.
///
/// Only `CreditNote` documents accept returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Receipt,
    Invoice,
    CreditNote,
}

impl DocumentType {
    /// Document type used when the caller does not pick one.
    #[inline]
    pub fn default_for(method: PaymentMethod) -> Self {
        if method.is_credit() {
            DocumentType::CreditNote
        } else {
            DocumentType::Receipt
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A committed sale. Immutable once written.
///
/// Invariants:
/// - `credit_amount_cents == total_cents - paid_amount_cents`
/// - `status == Pending` iff `credit_amount_cents > 0`
/// - non-credit payment methods have `credit_amount_cents == 0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Human-readable sequential number, e.g. `ORD-000123`.
    pub order_number: String,
    pub document_type: DocumentType,
    /// `None` for walk-in customers.
    pub customer_id: Option<String>,
    pub seller_id: String,
    pub seller_name: String,
    pub total_cents: i64,
    pub paid_amount_cents: i64,
    pub credit_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_cents(self.paid_amount_cents)
    }

    #[inline]
    pub fn credit_amount(&self) -> Money {
        Money::from_cents(self.credit_amount_cents)
    }
}

/// A line item of an order.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    /// Position in the cart, starting at 1.
    pub position: i64,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Catalog price or the per-line override.
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`
    pub line_total_cents: i64,
}

impl OrderLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Fully hydrated order as returned by a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub customer: Option<Customer>,
    pub seller: Actor,
}

// =============================================================================
// Returns
// =============================================================================

/// Physical condition of a returned unit, deciding where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Back into sellable stock.
    Good,
    /// Into defective stock.
    Defective,
    /// Scrapped; recorded for audit only.
    Unusable,
}

/// A processed return against a credit-note order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDocument {
    pub id: String,
    /// Human-readable sequential number, e.g. `RET-000007`.
    pub return_number: String,
    /// The credit-note order the goods came from.
    pub order_id: String,
    /// Amount to refund, stored negative.
    pub total_cents: i64,
    pub processed_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ReturnDocument {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// One returned product on a return document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLine {
    pub id: String,
    pub return_id: String,
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub disposition: Disposition,
    pub reason: Option<String>,
    /// Units that went back to sellable stock.
    pub restocked_quantity: i64,
    /// Unit price on the original order line.
    pub unit_price_cents: i64,
}

/// A return document with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetail {
    pub document: ReturnDocument,
    pub lines: Vec<ReturnLine>,
}

/// Result handed back to the return-entry caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    pub return_document: ReturnDetail,
    pub processed_count: usize,
    pub stock_effects: Vec<StockEffect>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// An append-only ledger entry recording one stock change and its cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub pool: StockPool,
    /// Always positive; direction comes from `movement_type`.
    pub quantity: i64,
    pub source: MovementSource,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub label: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Quantity with the movement direction applied.
    #[inline]
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.movement_type.sign()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One requested cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
    /// Replaces the catalog price for this line only.
    #[serde(default)]
    pub unit_price_override_cents: Option<i64>,
}

/// What the order-entry caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    pub payment_method: PaymentMethod,
    /// Only read for `CREDIT`; cash-type payments always pay the total.
    #[serde(default)]
    pub paid_amount_cents: Option<i64>,
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One requested return line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItemRequest {
    pub product_id: String,
    pub quantity: i64,
    pub disposition: Disposition,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What the return-entry caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub document_id: String,
    pub returns: Vec<ReturnItemRequest>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_credit_amount() {
        assert_eq!(
            OrderStatus::for_credit_amount(Money::zero()),
            OrderStatus::Completed
        );
        assert_eq!(
            OrderStatus::for_credit_amount(Money::from_cents(1)),
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_default_document_type() {
        assert_eq!(
            DocumentType::default_for(PaymentMethod::Credit),
            DocumentType::CreditNote
        );
        assert_eq!(
            DocumentType::default_for(PaymentMethod::Transfer),
            DocumentType::Receipt
        );
    }

    #[test]
    fn test_order_request_wire_format() {
        let request: OrderRequest = serde_json::from_str(
            r#"{
                "customerId": "c-1",
                "items": [{"productId": "p-1", "quantity": 2, "unitPriceOverrideCents": 900}],
                "paymentMethod": "CREDIT",
                "paidAmountCents": 500
            }"#,
        )
        .unwrap();

        assert_eq!(request.customer_id.as_deref(), Some("c-1"));
        assert_eq!(request.items[0].unit_price_override_cents, Some(900));
        assert_eq!(request.payment_method, PaymentMethod::Credit);
        assert_eq!(request.document_type, None);
    }

    #[test]
    fn test_return_request_wire_format() {
        let request: ReturnRequest = serde_json::from_str(
            r#"{"documentId": "o-1", "returns": [{"productId": "p-1", "quantity": 1, "disposition": "UNUSABLE"}]}"#,
        )
        .unwrap();
        assert_eq!(request.returns[0].disposition, Disposition::Unusable);
        assert_eq!(request.returns[0].reason, None);
    }

    #[test]
    fn test_customer_available_credit() {
        let now = Utc::now();
        let customer = Customer {
            id: "c-1".into(),
            name: "Ana".into(),
            credit_limit_cents: 10000,
            credit_used_cents: 8000,
            is_blocked: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(customer.available_credit(), Money::from_cents(2000));
    }
}
