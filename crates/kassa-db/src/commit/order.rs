//! # Order Commit
//!
//! Turns a cart into a committed order: header, lines, stock decrements,
//! ledger entries and the credit increment, all in one transaction.
//!
//! ## Atomic Phase
//! ```text
//! BEGIN
//!   next_number('order')                   → ORD-000124
//!   INSERT orders
//!   for each line:
//!     INSERT order_lines
//!     UPDATE products SET sellable_stock = sellable_stock - qty
//!      WHERE id = ? AND sellable_stock >= qty      0 rows → Conflict
//!     INSERT stock_movements (OUT, SALE)
//!   if credit > 0:
//!     UPDATE customers SET credit_used = credit_used + credit
//!      WHERE id = ? AND NOT blocked
//!        AND credit_used + credit <= credit_limit  0 rows → Conflict
//! COMMIT
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{report_failure, validate_actor};
use crate::error::{CommitError, CommitResult, DbError};
use crate::repository::customer::CustomerRepository;
use crate::repository::finish;
use crate::repository::movement::MovementRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sequence::SequenceRepository;
use kassa_core::{
    check_credit, plan_order, Actor, CoreError, DocumentSeries, MovementReason, MovementType, Order,
    OrderDetail, OrderLine, OrderPlan, OrderRequest, StockPool,
};

/// Commits orders.
#[derive(Debug, Clone)]
pub struct OrderCommitService {
    pool: SqlitePool,
}

impl OrderCommitService {
    /// Creates a new OrderCommitService.
    pub fn new(pool: SqlitePool) -> Self {
        OrderCommitService { pool }
    }

    /// Validates and commits one order on behalf of `actor`.
    ///
    /// ## Returns
    /// * `Ok(OrderDetail)` - The committed order with lines, customer and seller
    /// * `Err(CommitError::Rejected)` - Request broke a rule; nothing written
    /// * `Err(CommitError::Conflict)` - Stock or credit changed under us; rolled back
    /// * `Err(CommitError::Storage)` - Storage failed; rolled back
    pub async fn commit(&self, actor: &Actor, request: &OrderRequest) -> CommitResult<OrderDetail> {
        let result = self.run(actor, request).await;

        match &result {
            Ok(detail) => info!(
                order_id = %detail.order.id,
                order_number = %detail.order.order_number,
                total = %detail.order.total(),
                credit = %detail.order.credit_amount(),
                lines = detail.lines.len(),
                seller = %actor.user_id,
                "Order committed"
            ),
            Err(err) => report_failure("order", actor, err),
        }

        result
    }

    async fn run(&self, actor: &Actor, request: &OrderRequest) -> CommitResult<OrderDetail> {
        validate_actor(actor)?;

        let plan = self.plan(request).await?;
        debug!(
            lines = plan.lines.len(),
            total = %plan.total,
            credit = %plan.credit_amount,
            "Order planned"
        );

        self.apply(actor, &plan).await
    }

    /// Writes a planned order in one transaction.
    ///
    /// Stock and credit are re-checked against the live rows here; a plan
    /// that went stale since it was made fails with `CommitError::Conflict`.
    async fn apply(&self, actor: &Actor, plan: &OrderPlan) -> CommitResult<OrderDetail> {
        let order_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;
        let result: CommitResult<OrderDetail> = async {
            let order_number = SequenceRepository::next_number(&mut tx, DocumentSeries::Order).await?;

            let order = Order {
                id: order_id.clone(),
                order_number,
                document_type: plan.document_type,
                customer_id: plan.customer_id.clone(),
                seller_id: actor.user_id.trim().to_string(),
                seller_name: actor.display_name.trim().to_string(),
                total_cents: plan.total.cents(),
                paid_amount_cents: plan.paid_amount.cents(),
                credit_amount_cents: plan.credit_amount.cents(),
                payment_method: plan.payment_method,
                status: plan.status,
                notes: plan.notes.clone(),
                created_at: Utc::now(),
            };
            OrderRepository::insert(&mut tx, &order).await?;

            let sale = MovementReason::Sale {
                order_id: order_id.clone(),
            };

            for line in &plan.lines {
                OrderRepository::insert_line(
                    &mut tx,
                    &OrderLine {
                        id: Uuid::new_v4().to_string(),
                        order_id: order_id.clone(),
                        position: line.position,
                        product_id: line.product_id.clone(),
                        sku_snapshot: line.sku.clone(),
                        name_snapshot: line.name.clone(),
                        quantity: line.quantity,
                        unit_price_cents: line.unit_price.cents(),
                        line_total_cents: line.line_total.cents(),
                    },
                )
                .await?;

                if !ProductRepository::try_take_sellable(&mut tx, &line.product_id, line.quantity).await? {
                    let cause = match ProductRepository::fetch(&mut tx, &line.product_id).await? {
                        Some(product) => CoreError::InsufficientStock {
                            sku: product.sku,
                            available: product.sellable_stock,
                            requested: line.quantity,
                        },
                        None => CoreError::ProductNotFound(line.product_id.clone()),
                    };
                    return Err(CommitError::Conflict(cause));
                }

                MovementRepository::append(
                    &mut tx,
                    &line.product_id,
                    MovementType::Out,
                    StockPool::Sellable,
                    line.quantity,
                    &sale,
                )
                .await?;
            }

            if let (true, Some(customer_id)) = (plan.extends_credit(), plan.customer_id.as_deref()) {
                if !CustomerRepository::try_extend_credit(&mut tx, customer_id, plan.credit_amount).await? {
                    let cause = match CustomerRepository::fetch(&mut tx, customer_id).await? {
                        Some(customer) => check_credit(&customer, plan.credit_amount).err().unwrap_or_else(|| {
                            CoreError::CreditLimitExceeded {
                                customer_id: customer.id.clone(),
                                limit: customer.credit_limit(),
                                used: customer.credit_used(),
                                requested: plan.credit_amount,
                            }
                        }),
                        None => CoreError::CustomerNotFound(customer_id.to_string()),
                    };
                    return Err(CommitError::Conflict(cause));
                }
            }

            let detail = OrderRepository::fetch_detail(&mut tx, &order_id)
                .await?
                .ok_or_else(|| DbError::not_found("Order", order_id.as_str()))?;
            Ok(detail)
        }
        .await;

        finish(tx, result).await
    }

    /// Reads the catalog and customer snapshot and plans the order.
    async fn plan(&self, request: &OrderRequest) -> CommitResult<OrderPlan> {
        let ids: Vec<&str> = request.items.iter().map(|item| item.product_id.as_str()).collect();
        let catalog = ProductRepository::new(self.pool.clone()).get_many(&ids).await?;

        let customer = match request.customer_id.as_deref() {
            Some(id) => CustomerRepository::new(self.pool.clone()).get_by_id(id).await?,
            None => None,
        };

        Ok(plan_order(request, &catalog, customer.as_ref())?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use kassa_core::{
        Customer, DocumentType, ErrorKind, Money, NewCustomer, NewProduct, OrderItemRequest, OrderStatus,
        PaymentMethod, Product,
    };

    fn clerk() -> Actor {
        Actor::new("user-1", "Clerk One")
    }

    async fn product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .create(&NewProduct {
                sku: sku.to_string(),
                name: format!("Product {}", sku),
                unit_price_cents: price_cents,
                initial_stock: stock,
            })
            .await
            .unwrap()
    }

    /// Customer with `used` of `limit` credit already taken.
    async fn customer(db: &Database, limit: i64, used: i64) -> Customer {
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Ana Souza".to_string(),
                credit_limit_cents: limit,
            })
            .await
            .unwrap();
        if used > 0 {
            let mut conn = db.pool().acquire().await.unwrap();
            assert!(CustomerRepository::try_extend_credit(&mut conn, &customer.id, Money::from_cents(used))
                .await
                .unwrap());
        }
        db.customers().get_by_id(&customer.id).await.unwrap().unwrap()
    }

    fn item(product_id: &str, quantity: i64) -> OrderItemRequest {
        OrderItemRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_price_override_cents: None,
        }
    }

    fn cash(items: Vec<OrderItemRequest>) -> OrderRequest {
        OrderRequest {
            customer_id: None,
            items,
            payment_method: PaymentMethod::Cash,
            paid_amount_cents: None,
            document_type: None,
            notes: None,
        }
    }

    fn credit(customer_id: &str, items: Vec<OrderItemRequest>, paid_cents: i64) -> OrderRequest {
        OrderRequest {
            customer_id: Some(customer_id.to_string()),
            items,
            payment_method: PaymentMethod::Credit,
            paid_amount_cents: Some(paid_cents),
            document_type: None,
            notes: None,
        }
    }

    async fn sellable(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().sellable_stock
    }

    #[tokio::test]
    async fn test_cash_order_takes_all_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 5).await;

        let detail = db.order_commits().commit(&clerk(), &cash(vec![item(&x.id, 5)])).await.unwrap();

        assert_eq!(detail.order.order_number, "ORD-000001");
        assert_eq!(detail.order.total_cents, 5000);
        assert_eq!(detail.order.paid_amount_cents, 5000);
        assert_eq!(detail.order.credit_amount_cents, 0);
        assert_eq!(detail.order.status, OrderStatus::Completed);
        assert_eq!(detail.order.document_type, DocumentType::Receipt);
        assert_eq!(detail.seller, clerk());
        assert!(detail.customer.is_none());
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].sku_snapshot, "X-1");

        assert_eq!(sellable(&db, &x.id).await, 0);

        let movements = db.movements().list_for_reference(&detail.order.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Out);
        assert_eq!(movements[0].quantity, 5);
        assert_eq!(
            movements[0].label,
            format!("sale #{}", &detail.order.id[..8])
        );
        assert_eq!(db.movements().net_quantity(&x.id, StockPool::Sellable).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_order_up_to_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 10).await;
        let ana = customer(&db, 10000, 8000).await;

        let detail = db
            .order_commits()
            .commit(&clerk(), &credit(&ana.id, vec![item(&x.id, 3)], 1000))
            .await
            .unwrap();

        assert_eq!(detail.order.total_cents, 3000);
        assert_eq!(detail.order.credit_amount_cents, 2000);
        assert_eq!(detail.order.status, OrderStatus::Pending);
        assert_eq!(detail.order.document_type, DocumentType::CreditNote);

        let hydrated = detail.customer.unwrap();
        assert_eq!(hydrated.credit_used_cents, 10000);
        assert_eq!(
            db.customers().get_by_id(&ana.id).await.unwrap().unwrap().credit_used_cents,
            10000
        );
    }

    #[tokio::test]
    async fn test_credit_over_limit_changes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 10).await;
        let ana = customer(&db, 10000, 8000).await;

        let err = db
            .order_commits()
            .commit(&clerk(), &credit(&ana.id, vec![item(&x.id, 3)], 500))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CreditLimitExceeded);
        assert!(matches!(err, CommitError::Rejected(_)));
        assert_eq!(sellable(&db, &x.id).await, 10);
        assert_eq!(
            db.customers().get_by_id(&ana.id).await.unwrap().unwrap().credit_used_cents,
            8000
        );
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.movements().list_for_product(&x.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 5).await;

        let err = db
            .order_commits()
            .commit(&clerk(), &cash(vec![item(&x.id, 6)]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(err.to_string().contains("X-1"));
        assert_eq!(sellable(&db, &x.id).await, 5);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blocked_customer_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 5).await;
        let ana = customer(&db, 10000, 0).await;
        db.customers().set_blocked(&ana.id, true).await.unwrap();

        let err = db
            .order_commits()
            .commit(&clerk(), &credit(&ana.id, vec![item(&x.id, 1)], 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CustomerBlocked);
    }

    #[tokio::test]
    async fn test_unknown_product_and_missing_seller() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .order_commits()
            .commit(&clerk(), &cash(vec![item("missing", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db
            .order_commits()
            .commit(&Actor::new("  ", "Nobody"), &cash(vec![item("missing", 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_stock_taken_after_planning_is_a_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 5).await;
        let service = db.order_commits();

        let plan = service.plan(&cash(vec![item(&x.id, 4)])).await.unwrap();

        // Another seller takes three units between the two phases.
        {
            let mut conn = db.pool().acquire().await.unwrap();
            assert!(ProductRepository::try_take_sellable(&mut conn, &x.id, 3).await.unwrap());
        }

        let err = service.apply(&clerk(), &plan).await.unwrap_err();
        assert!(
            matches!(
                err,
                CommitError::Conflict(CoreError::InsufficientStock {
                    available: 2,
                    requested: 4,
                    ..
                })
            ),
            "unexpected error: {:?}",
            err
        );
        assert_eq!(err.kind(), ErrorKind::ConflictRetryable);

        assert_eq!(sellable(&db, &x.id).await, 2);
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.movements().list_for_product(&x.id, 10).await.unwrap().len(), 1);
        assert_eq!(db.sequences().current(DocumentSeries::Order).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_taken_after_planning_is_a_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 10).await;
        let ana = customer(&db, 10000, 0).await;
        let service = db.order_commits();

        // 40.00 total, 10.00 paid, 30.00 on credit: fits when planned.
        let plan = service
            .plan(&credit(&ana.id, vec![item(&x.id, 4)], 1000))
            .await
            .unwrap();
        assert_eq!(plan.credit_amount, Money::from_cents(3000));

        {
            let mut conn = db.pool().acquire().await.unwrap();
            assert!(CustomerRepository::try_extend_credit(&mut conn, &ana.id, Money::from_cents(8000))
                .await
                .unwrap());
        }

        let err = service.apply(&clerk(), &plan).await.unwrap_err();
        assert!(
            matches!(err, CommitError::Conflict(CoreError::CreditLimitExceeded { .. })),
            "unexpected error: {:?}",
            err
        );

        // The stock decrement earlier in the transaction is rolled back too.
        assert_eq!(sellable(&db, &x.id).await, 10);
        assert_eq!(
            db.customers().get_by_id(&ana.id).await.unwrap().unwrap().credit_used_cents,
            8000
        );
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.movements().list_for_product(&x.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_everything() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 10).await;
        let ana = customer(&db, 10000, 0).await;

        // Fails the last write of the atomic phase.
        sqlx::query(
            r#"
            CREATE TRIGGER fail_credit BEFORE UPDATE OF credit_used_cents ON customers
            BEGIN
                SELECT RAISE(ABORT, 'credit ledger offline');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .order_commits()
            .commit(&clerk(), &credit(&ana.id, vec![item(&x.id, 4)], 1000))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(sellable(&db, &x.id).await, 10);
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.movements().list_for_product(&x.id, 10).await.unwrap().len(), 1);
        assert_eq!(db.sequences().current(DocumentSeries::Order).await.unwrap(), 0);

        sqlx::query("DROP TRIGGER fail_credit").execute(db.pool()).await.unwrap();
        let detail = db
            .order_commits()
            .commit(&clerk(), &credit(&ana.id, vec![item(&x.id, 4)], 1000))
            .await
            .unwrap();
        assert_eq!(detail.order.order_number, "ORD-000001");
    }

    #[tokio::test]
    async fn test_numbers_follow_each_other() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 250, 10).await;

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let detail = db.order_commits().commit(&clerk(), &cash(vec![item(&x.id, 1)])).await.unwrap();
            numbers.push(detail.order.order_number);
        }

        assert_eq!(numbers, vec!["ORD-000001", "ORD-000002", "ORD-000003"]);
        let second = db.orders().get_by_number("ORD-000002").await.unwrap().unwrap();
        assert_eq!(second.total(), Money::from_cents(250));
    }

    #[tokio::test]
    async fn test_repeated_product_lines_write_one_movement_each() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let x = product(&db, "X-1", 1000, 5).await;

        let mut request = cash(vec![item(&x.id, 2), item(&x.id, 3)]);
        request.notes = Some("two bags".to_string());
        let detail = db.order_commits().commit(&clerk(), &request).await.unwrap();

        assert_eq!(detail.lines.len(), 2);
        assert_eq!(detail.order.notes.as_deref(), Some("two bags"));
        assert_eq!(sellable(&db, &x.id).await, 0);
        assert_eq!(db.movements().list_for_reference(&detail.order.id).await.unwrap().len(), 2);

        let fetched = db.orders().get_detail(&detail.order.id).await.unwrap().unwrap();
        assert_eq!(fetched, detail);
    }
}
