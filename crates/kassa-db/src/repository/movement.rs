//! # Stock Movement Repository
//!
//! The append-only stock ledger. Rows are only ever inserted; the schema
//! rejects UPDATE and DELETE with triggers.
//!
//! For each product and pool, `Σ IN − Σ OUT` over the ledger equals the
//! counter on the product row. [`MovementRepository::net_quantity`] exposes
//! the left-hand side so that can be checked.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kassa_core::{MovementReason, MovementType, StockMovement, StockPool};

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Movements of one product, newest first.
    pub async fn list_for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, pool, quantity, source,
                   reference_id, note, label, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Movements caused by one document (order id or return document id),
    /// in the order they were written.
    pub async fn list_for_reference(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, pool, quantity, source,
                   reference_id, note, label, created_at
            FROM stock_movements
            WHERE reference_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// `Σ IN − Σ OUT` for one product and pool.
    pub async fn net_quantity(&self, product_id: &str, pool: StockPool) -> DbResult<i64> {
        let net: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE movement_type WHEN 'IN' THEN quantity ELSE -quantity END), 0)
            FROM stock_movements
            WHERE product_id = ?1 AND pool = ?2
            "#,
        )
        .bind(product_id)
        .bind(pool)
        .fetch_one(&self.pool)
        .await?;

        Ok(net)
    }

    /// Appends one ledger entry through the caller's connection.
    ///
    /// ## Arguments
    /// * `quantity` - Positive; the direction comes from `movement_type`
    /// * `reason` - Structured cause, stored as source / reference / note / label
    pub async fn append(
        conn: &mut SqliteConnection,
        product_id: &str,
        movement_type: MovementType,
        pool: StockPool,
        quantity: i64,
        reason: &MovementReason,
    ) -> DbResult<StockMovement> {
        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            movement_type,
            pool,
            quantity,
            source: reason.source(),
            reference_id: reason.reference_id().map(str::to_string),
            note: reason.note().map(str::to_string),
            label: reason.label(),
            created_at: Utc::now(),
        };

        debug!(
            product_id = %product_id,
            ?movement_type,
            ?pool,
            quantity,
            label = %movement.label,
            "Appending stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, movement_type, pool, quantity, source,
                reference_id, note, label, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.pool)
        .bind(movement.quantity)
        .bind(movement.source)
        .bind(&movement.reference_id)
        .bind(&movement.note)
        .bind(&movement.label)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(movement)
    }
}
