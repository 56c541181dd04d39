//! # Order Planning
//!
//! Turns an [`OrderRequest`] plus a snapshot of the catalog and customer
//! into an [`OrderPlan`]: priced lines, totals, payment split and status.
//! Nothing here writes anything; the plan is what the commit service then
//! applies inside one transaction.
//!
//! ## Validation Sequence (fail-fast)
//! ```text
//! 1. cart non-empty                              → InvalidRequest
//! 2. CREDIT needs a registered customer          → InvalidRequest
//! 3. CREDIT needs paid amount > 0                → InvalidRequest
//! 4. every product exists, is active,            → NotFound / InvalidRequest
//!    and has sellable stock for the total qty    → InsufficientStock
//! 5. unit price = override or catalog price; line total; order total
//! 6. paid = total (cash-type) or caller value (CREDIT)
//! 7. cash-type payments leave credit == 0        → InvalidRequest
//! 8. credit > 0: customer not blocked,           → CustomerBlocked
//!    used + credit <= limit                      → CreditLimitExceeded
//! ```
//!
//! The stock and credit checks here read a snapshot. The commit repeats both
//! as conditional updates, which is what actually guarantees the invariants
//! under concurrent sellers.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    Customer, DocumentType, OrderRequest, OrderStatus, PaymentMethod, Product,
};
use crate::validation::{
    validate_line_count, validate_note, validate_price_cents, validate_quantity,
};

/// A priced cart line, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    /// Position in the cart, starting at 1.
    pub position: i64,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Total quantity requested for one product across all cart lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDemand {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
}

/// Everything the commit needs to write an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub document_type: DocumentType,
    pub lines: Vec<PlannedLine>,
    /// One entry per distinct product, in first-appearance order.
    pub stock_demand: Vec<StockDemand>,
    pub total: Money,
    pub paid_amount: Money,
    pub credit_amount: Money,
    pub status: OrderStatus,
    pub notes: Option<String>,
}

impl OrderPlan {
    /// Whether the commit must extend the customer's credit.
    pub fn extends_credit(&self) -> bool {
        self.credit_amount.is_positive() && self.customer_id.is_some()
    }
}

/// Plans an order against a catalog / customer snapshot.
///
/// ## Arguments
/// * `request` - What the caller submitted
/// * `catalog` - Products referenced by the request, keyed by id
/// * `customer` - The customer named by `request.customer_id`, if found
pub fn plan_order(
    request: &OrderRequest,
    catalog: &HashMap<String, Product>,
    customer: Option<&Customer>,
) -> CoreResult<OrderPlan> {
    // 1. Non-empty cart
    if request.items.is_empty() {
        return Err(CoreError::invalid("cart is empty"));
    }
    validate_line_count("items", request.items.len())?;

    let method = request.payment_method;

    // 2-3. Credit sale prerequisites
    if method.is_credit() {
        if request.customer_id.is_none() {
            return Err(CoreError::invalid(
                "credit payment requires a registered customer",
            ));
        }
        match request.paid_amount_cents {
            Some(paid) if paid > 0 => {}
            _ => {
                return Err(CoreError::invalid(
                    "credit payment requires a paid amount greater than zero",
                ))
            }
        }
    }

    validate_note("notes", request.notes.as_deref())?;

    // 4-5. Products, stock, pricing
    let mut lines = Vec::with_capacity(request.items.len());
    let mut stock_demand: Vec<StockDemand> = Vec::new();
    let mut total = Money::zero();

    for (index, item) in request.items.iter().enumerate() {
        validate_quantity(item.quantity)?;

        let product = catalog
            .get(&item.product_id)
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

        if !product.is_active {
            return Err(CoreError::invalid(format!(
                "product {} is not active",
                product.sku
            )));
        }

        // Repeated lines draw on the same stock, so the check runs on the
        // running total for the product.
        let demanded = match stock_demand.iter_mut().find(|d| d.product_id == product.id) {
            Some(demand) => {
                demand.quantity += item.quantity;
                demand.quantity
            }
            None => {
                stock_demand.push(StockDemand {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    quantity: item.quantity,
                });
                item.quantity
            }
        };
        if !product.can_sell(demanded) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.sellable_stock,
                requested: demanded,
            });
        }

        let unit_price = match item.unit_price_override_cents {
            Some(cents) => {
                validate_price_cents(cents)?;
                Money::from_cents(cents)
            }
            None => product.price(),
        };

        let line_total = unit_price
            .checked_multiply_quantity(item.quantity)
            .ok_or_else(|| CoreError::invalid("line total overflows"))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| CoreError::invalid("order total overflows"))?;

        lines.push(PlannedLine {
            position: index as i64 + 1,
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity: item.quantity,
            unit_price,
            line_total,
        });
    }

    // 6. Payment split
    let paid_amount = if method.is_credit() {
        Money::from_cents(request.paid_amount_cents.unwrap_or(0))
    } else {
        total
    };

    if paid_amount > total {
        return Err(CoreError::invalid(format!(
            "paid amount {} exceeds order total {}",
            paid_amount, total
        )));
    }

    let credit_amount = total - paid_amount;

    // 7. Cash-type payments must be complete
    if !method.is_credit() && !credit_amount.is_zero() {
        return Err(CoreError::invalid(
            "paid amount must equal total for cash-type payments",
        ));
    }

    // Customer named on the request must exist, credit sale or not
    let customer = match &request.customer_id {
        Some(id) => Some(
            customer
                .filter(|c| &c.id == id)
                .ok_or_else(|| CoreError::CustomerNotFound(id.clone()))?,
        ),
        None => None,
    };

    // 8. Credit account
    if credit_amount.is_positive() {
        if let Some(customer) = customer {
            check_credit(customer, credit_amount)?;
        }
    }

    Ok(OrderPlan {
        customer_id: request.customer_id.clone(),
        payment_method: method,
        document_type: request
            .document_type
            .unwrap_or_else(|| DocumentType::default_for(method)),
        lines,
        stock_demand,
        total,
        paid_amount,
        credit_amount,
        status: OrderStatus::for_credit_amount(credit_amount),
        notes: request.notes.clone(),
    })
}

/// Checks that `customer` may take on `amount` of new credit.
pub fn check_credit(customer: &Customer, amount: Money) -> CoreResult<()> {
    if customer.is_blocked {
        return Err(CoreError::CustomerBlocked {
            customer_id: customer.id.clone(),
        });
    }

    let exceeds = customer
        .credit_used()
        .checked_add(amount)
        .map_or(true, |after| after > customer.credit_limit());

    if exceeds {
        return Err(CoreError::CreditLimitExceeded {
            customer_id: customer.id.clone(),
            limit: customer.credit_limit(),
            used: customer.credit_used(),
            requested: amount,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
