//! # Order Repository
//!
//! Orders are written once by the order commit and never updated. This
//! repository holds the inserts used by that commit and the read side.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kassa_core::{Actor, Order, OrderDetail, OrderLine};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets an order header by its human-readable number.
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, order_number, document_type, customer_id, seller_id, seller_name,
                   total_cents, paid_amount_cents, credit_amount_cents, payment_method,
                   status, notes, created_at
            FROM orders
            WHERE order_number = ?1
            "#,
        )
        .bind(order_number.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all lines of an order, in cart order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_lines(&mut conn, order_id).await
    }

    /// Gets the hydrated order: header, lines, customer and seller.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<OrderDetail>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_detail(&mut conn, id).await
    }

    /// Counts all orders (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Connection-bound (inside a caller's transaction)
    // =========================================================================

    /// Reads an order header through the caller's connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, order_number, document_type, customer_id, seller_id, seller_name,
                   total_cents, paid_amount_cents, credit_amount_cents, payment_method,
                   status, notes, created_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(order)
    }

    /// Reads the lines of an order through the caller's connection.
    pub async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, position, product_id, sku_snapshot, name_snapshot,
                   quantity, unit_price_cents, line_total_cents
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Reads the hydrated order through the caller's connection.
    pub async fn fetch_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<OrderDetail>> {
        let Some(order) = Self::fetch(conn, id).await? else {
            return Ok(None);
        };

        let lines = Self::fetch_lines(conn, id).await?;

        let customer = match &order.customer_id {
            Some(customer_id) => Some(
                crate::repository::customer::CustomerRepository::fetch(conn, customer_id)
                    .await?
                    .ok_or_else(|| DbError::corrupt("orders", format!("unknown customer {}", customer_id)))?,
            ),
            None => None,
        };

        let seller = Actor::new(order.seller_id.clone(), order.seller_name.clone());

        Ok(Some(OrderDetail {
            order,
            lines,
            customer,
            seller,
        }))
    }

    /// Inserts an order header.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, document_type, customer_id, seller_id, seller_name,
                total_cents, paid_amount_cents, credit_amount_cents, payment_method,
                status, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(order.document_type)
        .bind(&order.customer_id)
        .bind(&order.seller_id)
        .bind(&order.seller_name)
        .bind(order.total_cents)
        .bind(order.paid_amount_cents)
        .bind(order.credit_amount_cents)
        .bind(order.payment_method)
        .bind(order.status)
        .bind(&order.notes)
        .bind(order.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one order line.
    ///
    /// ## Snapshot Pattern
    /// SKU, name and price are copied onto the line so the order reads the
    /// same after the catalog changes.
    pub async fn insert_line(conn: &mut SqliteConnection, line: &OrderLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, position, product_id, sku_snapshot, name_snapshot,
                quantity, unit_price_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(line.position)
        .bind(&line.product_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total_cents)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
