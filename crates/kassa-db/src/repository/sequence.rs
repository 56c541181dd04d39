//! # Document Sequence Repository
//!
//! Per-series counters for human-readable document numbers.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE document_sequences                                           │
//! │       SET last_value = last_value + 1                                  │
//! │     WHERE name = 'order'                                               │
//! │    RETURNING last_value            ← takes the write lock first        │
//! │    ... insert order, lines, movements ...                              │
//! │  COMMIT                            ← number and order land together    │
//! │                                                                         │
//! │  A rolled-back commit gives its number back with it.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Databases created before the sequence table existed have no row for a
//! series. The first allocation then seeds it from the newest existing
//! document number, inside the same transaction.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use kassa_core::numbering::{self, DocumentSeries};

/// Repository for document numbering.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Last value handed out for `series` (0 if none yet).
    pub async fn current(&self, series: DocumentSeries) -> DbResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM document_sequences WHERE name = ?1")
                .bind(series.key())
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(0))
    }

    /// Allocates the next number of `series`, formatted (e.g. `ORD-000124`).
    ///
    /// Must be the first statement of the caller's transaction.
    pub async fn next_number(conn: &mut SqliteConnection, series: DocumentSeries) -> DbResult<String> {
        let value = Self::next_value(conn, series).await?;
        Ok(series.format(value))
    }

    /// Advances the counter of `series` and returns the new value.
    pub async fn next_value(conn: &mut SqliteConnection, series: DocumentSeries) -> DbResult<i64> {
        let advanced: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE document_sequences
            SET last_value = last_value + 1
            WHERE name = ?1
            RETURNING last_value
            "#,
        )
        .bind(series.key())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(value) = advanced {
            debug!(series = series.key(), value, "Allocated document number");
            return Ok(value);
        }

        let last = Self::latest_document_number(conn, series).await?;
        let value = numbering::next_after(last.as_deref());

        sqlx::query("INSERT INTO document_sequences (name, prefix, last_value) VALUES (?1, ?2, ?3)")
            .bind(series.key())
            .bind(series.prefix())
            .bind(value)
            .execute(&mut *conn)
            .await?;

        info!(
            series = series.key(),
            last = last.as_deref().unwrap_or("-"),
            value,
            "Seeded document sequence from existing documents"
        );
        Ok(value)
    }

    /// Number of the most recently created document of `series`.
    async fn latest_document_number(
        conn: &mut SqliteConnection,
        series: DocumentSeries,
    ) -> DbResult<Option<String>> {
        let sql = match series {
            DocumentSeries::Order => {
                "SELECT order_number FROM orders ORDER BY created_at DESC, rowid DESC LIMIT 1"
            }
            DocumentSeries::Return => {
                "SELECT return_number FROM return_documents ORDER BY created_at DESC, rowid DESC LIMIT 1"
            }
        };

        let number: Option<String> = sqlx::query_scalar(sql).fetch_optional(&mut *conn).await?;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_numbers_are_sequential_per_series() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let first = SequenceRepository::next_number(&mut conn, DocumentSeries::Order).await.unwrap();
        let second = SequenceRepository::next_number(&mut conn, DocumentSeries::Order).await.unwrap();
        let ret = SequenceRepository::next_number(&mut conn, DocumentSeries::Return).await.unwrap();
        drop(conn);

        assert_eq!(first, "ORD-000001");
        assert_eq!(second, "ORD-000002");
        assert_eq!(ret, "RET-000001");
        assert_eq!(db.sequences().current(DocumentSeries::Order).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rollback_returns_the_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        SequenceRepository::next_value(&mut tx, DocumentSeries::Order).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.sequences().current(DocumentSeries::Order).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_series_is_seeded_from_last_document() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query("DELETE FROM document_sequences WHERE name = 'order'")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, document_type, customer_id, seller_id, seller_name,
                total_cents, paid_amount_cents, credit_amount_cents, payment_method,
                status, notes, created_at
            ) VALUES ('o-legacy', 'ORD-000041', 'RECEIPT', NULL, 'u', 'Clerk',
                      0, 0, 0, 'CASH', 'COMPLETED', NULL, '2024-01-01T00:00:00Z')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let next = SequenceRepository::next_number(&mut conn, DocumentSeries::Order).await.unwrap();
        let after = SequenceRepository::next_number(&mut conn, DocumentSeries::Order).await.unwrap();
        drop(conn);

        assert_eq!(next, "ORD-000042");
        assert_eq!(after, "ORD-000043");
    }
}
