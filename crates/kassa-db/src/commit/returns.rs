//! # Return Commit
//!
//! Takes goods back against a credit-note order and routes every line by
//! its disposition.
//!
//! ## Disposition Routing
//! ```text
//! ┌─────────────┬──────────────────┬───────────────────┬─────────────────┐
//! │ Disposition │ sellable_stock   │ defective_stock   │ Ledger entry    │
//! ├─────────────┼──────────────────┼───────────────────┼─────────────────┤
//! │ GOOD        │ + qty            │                   │ IN, RETURN_GOOD │
//! │ DEFECTIVE   │                  │ + qty             │ IN, RETURN_DEF. │
//! │ UNUSABLE    │                  │                   │ none            │
//! └─────────────┴──────────────────┴───────────────────┴─────────────────┘
//! ```
//!
//! Every line, UNUSABLE included, is written as a return line.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{report_failure, validate_actor};
use crate::error::{CommitError, CommitResult, DbError};
use crate::repository::finish;
use crate::repository::movement::MovementRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::return_doc::ReturnRepository;
use crate::repository::sequence::SequenceRepository;
use kassa_core::{
    check_returnable, invoiced_quantity, plan_return, Actor, CoreError, DocumentSeries, MovementType,
    OrderLine, ReturnDetail, ReturnDocument, ReturnLine, ReturnPlan, ReturnReceipt, ReturnRequest,
};

/// Commits returns.
#[derive(Debug, Clone)]
pub struct ReturnCommitService {
    pool: SqlitePool,
}

impl ReturnCommitService {
    /// Creates a new ReturnCommitService.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnCommitService { pool }
    }

    /// Validates and commits one return on behalf of `actor`.
    ///
    /// ## Returns
    /// * `Ok(ReturnReceipt)` - The return document, line count and stock effects
    /// * `Err(CommitError::Rejected)` - Unknown document, wrong kind, or too many units
    /// * `Err(CommitError::Conflict)` - A concurrent return used up the headroom; rolled back
    /// * `Err(CommitError::Storage)` - Storage failed; rolled back
    pub async fn commit(&self, actor: &Actor, request: &ReturnRequest) -> CommitResult<ReturnReceipt> {
        let result = self.run(actor, request).await;

        match &result {
            Ok(receipt) => info!(
                return_id = %receipt.return_document.document.id,
                return_number = %receipt.return_document.document.return_number,
                order_id = %receipt.return_document.document.order_id,
                refund = %receipt.return_document.document.total(),
                lines = receipt.processed_count,
                processed_by = %actor.user_id,
                "Return committed"
            ),
            Err(err) => report_failure("return", actor, err),
        }

        result
    }

    async fn run(&self, actor: &Actor, request: &ReturnRequest) -> CommitResult<ReturnReceipt> {
        validate_actor(actor)?;

        let (plan, order_lines) = self.plan(request).await?;
        debug!(
            order_id = %plan.order_id,
            lines = plan.lines.len(),
            refund = %plan.total,
            "Return planned"
        );

        let return_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;
        let result: CommitResult<ReturnReceipt> = async {
            let return_number = SequenceRepository::next_number(&mut tx, DocumentSeries::Return).await?;

            // Another return against the same order may have committed since
            // the plan was made.
            let returned = ReturnRepository::fetch_returned_quantities(&mut tx, &plan.order_id).await?;
            for (product_id, quantity) in &plan.returned_per_product {
                check_returnable(
                    product_id,
                    *quantity,
                    invoiced_quantity(&order_lines, product_id),
                    returned.get(product_id).copied().unwrap_or(0),
                )
                .map_err(CommitError::Conflict)?;
            }

            let document = ReturnDocument {
                id: return_id.clone(),
                return_number,
                order_id: plan.order_id.clone(),
                total_cents: plan.total.cents(),
                processed_by: actor.user_id.trim().to_string(),
                created_at: Utc::now(),
            };
            ReturnRepository::insert_document(&mut tx, &document).await?;

            let mut lines = Vec::with_capacity(plan.lines.len());
            let mut stock_effects = Vec::with_capacity(plan.lines.len());

            for planned in &plan.lines {
                let line = ReturnLine {
                    id: Uuid::new_v4().to_string(),
                    return_id: return_id.clone(),
                    position: planned.position,
                    product_id: planned.product_id.clone(),
                    quantity: planned.quantity,
                    disposition: planned.disposition,
                    reason: planned.reason.clone(),
                    restocked_quantity: planned.effect.restocked_quantity,
                    unit_price_cents: planned.unit_price.cents(),
                };
                ReturnRepository::insert_line(&mut tx, &line).await?;

                let mut effect = planned.effect.clone();
                if let (Some(pool), Some(reason)) = (
                    planned.disposition.target_pool(),
                    planned.disposition.movement_reason(&return_id),
                ) {
                    if !ProductRepository::add_to_pool(&mut tx, &planned.product_id, pool, planned.quantity).await? {
                        return Err(DbError::not_found("Product", planned.product_id.as_str()).into());
                    }

                    let movement = MovementRepository::append(
                        &mut tx,
                        &planned.product_id,
                        MovementType::In,
                        pool,
                        planned.quantity,
                        &reason,
                    )
                    .await?;
                    effect.movement_id = Some(movement.id);
                }

                lines.push(line);
                stock_effects.push(effect);
            }

            Ok(ReturnReceipt {
                processed_count: lines.len(),
                return_document: ReturnDetail { document, lines },
                stock_effects,
            })
        }
        .await;

        finish(tx, result).await
    }

    /// Reads the referenced document and plans the return against it.
    async fn plan(&self, request: &ReturnRequest) -> CommitResult<(ReturnPlan, Vec<OrderLine>)> {
        let orders = OrderRepository::new(self.pool.clone());

        let order = orders
            .get_by_id(request.document_id.trim())
            .await?
            .ok_or_else(|| CoreError::DocumentNotFound(request.document_id.clone()))?;
        let order_lines = orders.get_lines(&order.id).await?;
        let already_returned = ReturnRepository::new(self.pool.clone())
            .returned_quantities(&order.id)
            .await?;

        let plan = plan_return(request, &order, &order_lines, &already_returned)?;
        Ok((plan, order_lines))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
