//! # Return Planning
//!
//! Validates a [`ReturnRequest`] against the credit-note order it names and
//! decides, per line, where the returned units go.
//!
//! ## Disposition Routing
//! ```text
//! ┌─────────────┬─────────────────┬──────────────────┬─────────────────────┐
//! │ Disposition │ sellable_stock  │ defective_stock  │ restocked_quantity  │
//! ├─────────────┼─────────────────┼──────────────────┼─────────────────────┤
//! │ GOOD        │ + quantity      │                  │ quantity            │
//! │ DEFECTIVE   │                 │ + quantity       │ 0                   │
//! │ UNUSABLE    │                 │                  │ 0   (no movement)   │
//! └─────────────┴─────────────────┴──────────────────┴─────────────────────┘
//! ```
//!
//! Quantities are bounded per product by what the order invoiced minus what
//! earlier returns against the same order already took back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::ledger::{MovementReason, StockPool};
use crate::money::Money;
use crate::types::{Disposition, DocumentType, Order, OrderLine, ReturnRequest};
use crate::validation::{validate_line_count, validate_note, validate_quantity};

// =============================================================================
// Stock Effect
// =============================================================================

/// What one return line did to stock. Reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockEffect {
    pub product_id: String,
    pub disposition: Disposition,
    pub quantity: i64,
    pub sellable_delta: i64,
    pub defective_delta: i64,
    pub restocked_quantity: i64,
    /// Ledger entry written for this line; `None` for `UNUSABLE`.
    pub movement_id: Option<String>,
}

impl StockEffect {
    /// Whether the line touches stock (and so needs a ledger entry).
    pub fn changes_stock(&self) -> bool {
        self.sellable_delta != 0 || self.defective_delta != 0
    }
}

impl Disposition {
    /// Maps a returned quantity onto stock deltas.
    ///
    /// ```rust
    /// use kassa_core::types::Disposition;
    ///
    /// let effect = Disposition::Good.stock_effect("p-1", 3);
    /// assert_eq!(effect.sellable_delta, 3);
    /// assert_eq!(effect.restocked_quantity, 3);
    /// ```
    pub fn stock_effect(self, product_id: &str, quantity: i64) -> StockEffect {
        let (sellable_delta, defective_delta) = match self {
            Disposition::Good => (quantity, 0),
            Disposition::Defective => (0, quantity),
            Disposition::Unusable => (0, 0),
        };

        StockEffect {
            product_id: product_id.to_string(),
            disposition: self,
            quantity,
            sellable_delta,
            defective_delta,
            restocked_quantity: sellable_delta,
            movement_id: None,
        }
    }

    /// Stock pool receiving the units, if any.
    pub fn target_pool(self) -> Option<StockPool> {
        match self {
            Disposition::Good => Some(StockPool::Sellable),
            Disposition::Defective => Some(StockPool::Defective),
            Disposition::Unusable => None,
        }
    }

    /// Ledger reason for a line of return `return_id`, if it moves stock.
    pub fn movement_reason(self, return_id: &str) -> Option<MovementReason> {
        match self {
            Disposition::Good => Some(MovementReason::ReturnGood {
                return_id: return_id.to_string(),
            }),
            Disposition::Defective => Some(MovementReason::ReturnDefective {
                return_id: return_id.to_string(),
            }),
            Disposition::Unusable => None,
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A validated return line with its pricing and stock effect.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedReturnLine {
    pub position: i64,
    pub product_id: String,
    pub quantity: i64,
    pub disposition: Disposition,
    pub reason: Option<String>,
    /// Price the customer paid per unit on the order.
    pub unit_price: Money,
    /// `quantity × unit_price`, positive.
    pub refund: Money,
    pub effect: StockEffect,
}

/// Everything the commit needs to write a return.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPlan {
    pub order_id: String,
    pub lines: Vec<PlannedReturnLine>,
    /// Units returned per product by this request, first-appearance order.
    pub returned_per_product: Vec<(String, i64)>,
    /// Refund total, negative.
    pub total: Money,
}

/// Plans a return against `order`.
///
/// ## Arguments
/// * `request` - What the caller submitted
/// * `order` - The referenced document
/// * `order_lines` - Lines of `order`
/// * `already_returned` - Units per product taken back by earlier returns
pub fn plan_return(
    request: &ReturnRequest,
    order: &Order,
    order_lines: &[OrderLine],
    already_returned: &HashMap<String, i64>,
) -> CoreResult<ReturnPlan> {
    if request.returns.is_empty() {
        return Err(CoreError::invalid("no return lines"));
    }
    validate_line_count("returns", request.returns.len())?;

    if order.document_type != DocumentType::CreditNote {
        return Err(CoreError::invalid(format!(
            "document {} is not a credit note",
            order.order_number
        )));
    }

    let mut lines = Vec::with_capacity(request.returns.len());
    let mut returned_per_product: Vec<(String, i64)> = Vec::new();
    let mut total = Money::zero();

    for (index, item) in request.returns.iter().enumerate() {
        validate_quantity(item.quantity)?;
        validate_note("reason", item.reason.as_deref())?;

        let first_line = order_lines
            .iter()
            .find(|line| line.product_id == item.product_id)
            .ok_or_else(|| {
                CoreError::invalid(format!(
                    "product {} not on this document",
                    item.product_id
                ))
            })?;

        let unit_price = first_line.unit_price();
        let refund = unit_price
            .checked_multiply_quantity(item.quantity)
            .ok_or_else(|| CoreError::invalid("refund overflows"))?;
        total = total
            .checked_add(refund)
            .ok_or_else(|| CoreError::invalid("refund overflows"))?;

        match returned_per_product
            .iter_mut()
            .find(|(product_id, _)| product_id == &item.product_id)
        {
            Some((_, quantity)) => *quantity += item.quantity,
            None => returned_per_product.push((item.product_id.clone(), item.quantity)),
        }

        lines.push(PlannedReturnLine {
            position: index as i64 + 1,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            disposition: item.disposition,
            reason: item.reason.clone(),
            unit_price,
            refund,
            effect: item.disposition.stock_effect(&item.product_id, item.quantity),
        });
    }

    for (product_id, quantity) in &returned_per_product {
        check_returnable(
            product_id,
            *quantity,
            invoiced_quantity(order_lines, product_id),
            already_returned.get(product_id).copied().unwrap_or(0),
        )?;
    }

    Ok(ReturnPlan {
        order_id: order.id.clone(),
        lines,
        returned_per_product,
        total: -total,
    })
}

/// Units of `product_id` invoiced across all lines of an order.
pub fn invoiced_quantity(order_lines: &[OrderLine], product_id: &str) -> i64 {
    order_lines
        .iter()
        .filter(|line| line.product_id == product_id)
        .map(|line| line.quantity)
        .sum()
}

/// Checks that `requested` more units of a product may still be returned.
pub fn check_returnable(
    product_id: &str,
    requested: i64,
    invoiced: i64,
    already_returned: i64,
) -> CoreResult<()> {
    if already_returned + requested > invoiced {
        return Err(CoreError::invalid(format!(
            "return exceeds invoiced quantity for product {}: invoiced {}, already returned {}, requested {}",
            product_id, invoiced, already_returned, requested
        )));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{OrderStatus, PaymentMethod, ReturnItemRequest};
    use chrono::Utc;

    fn order(document_type: DocumentType) -> Order {
        Order {
            id: "o-1".to_string(),
            order_number: "ORD-000001".to_string(),
            document_type,
            customer_id: Some("c-1".to_string()),
            seller_id: "u-1".to_string(),
            seller_name: "Clerk".to_string(),
            total_cents: 4000,
            paid_amount_cents: 1000,
            credit_amount_cents: 3000,
            payment_method: PaymentMethod::Credit,
            status: OrderStatus::Pending,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> OrderLine {
        OrderLine {
            id: format!("l-{}", product_id),
            order_id: "o-1".to_string(),
            position: 1,
            product_id: product_id.to_string(),
            sku_snapshot: format!("SKU-{}", product_id),
            name_snapshot: format!("Product {}", product_id),
            quantity,
            unit_price_cents,
            line_total_cents: quantity * unit_price_cents,
        }
    }

    fn ret(product_id: &str, quantity: i64, disposition: Disposition) -> ReturnItemRequest {
        ReturnItemRequest {
            product_id: product_id.to_string(),
            quantity,
            disposition,
            reason: None,
        }
    }

    fn request(returns: Vec<ReturnItemRequest>) -> ReturnRequest {
        ReturnRequest {
            document_id: "o-1".to_string(),
            returns,
        }
    }

    #[test]
    fn test_disposition_routing() {
        let good = Disposition::Good.stock_effect("p", 3);
        assert_eq!((good.sellable_delta, good.defective_delta), (3, 0));
        assert_eq!(good.restocked_quantity, 3);

        let defective = Disposition::Defective.stock_effect("p", 2);
        assert_eq!((defective.sellable_delta, defective.defective_delta), (0, 2));
        assert_eq!(defective.restocked_quantity, 0);

        let unusable = Disposition::Unusable.stock_effect("p", 1);
        assert!(!unusable.changes_stock());
        assert_eq!(unusable.restocked_quantity, 0);
        assert_eq!(Disposition::Unusable.movement_reason("r"), None);
    }

    #[test]
    fn test_return_over_invoiced_rejected() {
        let lines = vec![line("y", 4, 1000)];
        let err = plan_return(
            &request(vec![ret("y", 5, Disposition::Defective)]),
            &order(DocumentType::CreditNote),
            &lines,
            &HashMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_return_full_quantity_defective() {
        let lines = vec![line("y", 4, 1000)];
        let plan = plan_return(
            &request(vec![ret("y", 4, Disposition::Defective)]),
            &order(DocumentType::CreditNote),
            &lines,
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(plan.lines[0].effect.defective_delta, 4);
        assert_eq!(plan.lines[0].effect.restocked_quantity, 0);
        assert_eq!(plan.total.cents(), -4000);
    }

    #[test]
    fn test_only_credit_notes_accept_returns() {
        let lines = vec![line("y", 4, 1000)];
        let err = plan_return(
            &request(vec![ret("y", 1, Disposition::Good)]),
            &order(DocumentType::Receipt),
            &lines,
            &HashMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_product_must_be_on_document() {
        let lines = vec![line("y", 4, 1000)];
        let err = plan_return(
            &request(vec![ret("z", 1, Disposition::Good)]),
            &order(DocumentType::CreditNote),
            &lines,
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not on this document"));
    }

    #[test]
    fn test_repeated_lines_and_prior_returns_count() {
        let lines = vec![line("y", 3, 500), line("y", 1, 500)];
        let order = order(DocumentType::CreditNote);

        // Two lines of 2 against 4 invoiced: fine
        let plan = plan_return(
            &request(vec![
                ret("y", 2, Disposition::Good),
                ret("y", 2, Disposition::Unusable),
            ]),
            &order,
            &lines,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(plan.returned_per_product, vec![("y".to_string(), 4)]);
        assert_eq!(plan.total.cents(), -2000);

        // One unit already returned: 4 more is too many
        let already = HashMap::from([("y".to_string(), 1)]);
        let err = plan_return(
            &request(vec![ret("y", 4, Disposition::Good)]),
            &order,
            &lines,
            &already,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_empty_and_zero_quantity_rejected() {
        let lines = vec![line("y", 4, 1000)];
        let order = order(DocumentType::CreditNote);
        assert!(plan_return(&request(vec![]), &order, &lines, &HashMap::new()).is_err());
        assert!(plan_return(
            &request(vec![ret("y", 0, Disposition::Good)]),
            &order,
            &lines,
            &HashMap::new()
        )
        .is_err());
    }
}
