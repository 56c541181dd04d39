//! # Return Document Repository
//!
//! Return documents and their lines. Like orders, written once by the
//! return commit and read afterwards.

use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;
use kassa_core::{ReturnDetail, ReturnDocument, ReturnLine};

/// Repository for return database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Gets a return document with its lines.
    pub async fn get_return(&self, id: &str) -> DbResult<Option<ReturnDetail>> {
        let mut conn = self.pool.acquire().await?;

        let Some(document) = Self::fetch_document(&mut conn, id).await? else {
            return Ok(None);
        };
        let lines = Self::fetch_lines(&mut conn, id).await?;

        Ok(Some(ReturnDetail { document, lines }))
    }

    /// Lists every return against an order, oldest first.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<ReturnDetail>> {
        let mut conn = self.pool.acquire().await?;

        let documents = sqlx::query_as::<_, ReturnDocument>(
            r#"
            SELECT id, return_number, order_id, total_cents, processed_by, created_at
            FROM return_documents
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut details = Vec::with_capacity(documents.len());
        for document in documents {
            let lines = Self::fetch_lines(&mut conn, &document.id).await?;
            details.push(ReturnDetail { document, lines });
        }

        Ok(details)
    }

    /// Units per product already returned against an order.
    pub async fn returned_quantities(&self, order_id: &str) -> DbResult<HashMap<String, i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_returned_quantities(&mut conn, order_id).await
    }

    // =========================================================================
    // Connection-bound (inside a caller's transaction)
    // =========================================================================

    /// Reads a return document header through the caller's connection.
    pub async fn fetch_document(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ReturnDocument>> {
        let document = sqlx::query_as::<_, ReturnDocument>(
            r#"
            SELECT id, return_number, order_id, total_cents, processed_by, created_at
            FROM return_documents
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(document)
    }

    /// Reads the lines of a return document, in request order.
    pub async fn fetch_lines(conn: &mut SqliteConnection, return_id: &str) -> DbResult<Vec<ReturnLine>> {
        let lines = sqlx::query_as::<_, ReturnLine>(
            r#"
            SELECT id, return_id, position, product_id, quantity, disposition, reason,
                   restocked_quantity, unit_price_cents
            FROM return_lines
            WHERE return_id = ?1
            ORDER BY position
            "#,
        )
        .bind(return_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Units per product already returned against an order, read through
    /// the caller's connection.
    pub async fn fetch_returned_quantities(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT l.product_id, SUM(l.quantity)
            FROM return_lines l
            JOIN return_documents d ON d.id = l.return_id
            WHERE d.order_id = ?1
            GROUP BY l.product_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Inserts a return document header.
    pub async fn insert_document(conn: &mut SqliteConnection, document: &ReturnDocument) -> DbResult<()> {
        debug!(id = %document.id, return_number = %document.return_number, "Inserting return document");

        sqlx::query(
            r#"
            INSERT INTO return_documents (
                id, return_number, order_id, total_cents, processed_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&document.id)
        .bind(&document.return_number)
        .bind(&document.order_id)
        .bind(document.total_cents)
        .bind(&document.processed_by)
        .bind(document.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one return line.
    pub async fn insert_line(conn: &mut SqliteConnection, line: &ReturnLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO return_lines (
                id, return_id, position, product_id, quantity, disposition, reason,
                restocked_quantity, unit_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.return_id)
        .bind(line.position)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.disposition)
        .bind(&line.reason)
        .bind(line.restocked_quantity)
        .bind(line.unit_price_cents)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
