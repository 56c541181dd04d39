//! # Repository Module
//!
//! Database repository implementations for Kassa.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways Into a Repository                           │
//! │                                                                         │
//! │  1. Pool-bound methods (&self)                                         │
//! │     db.products().get_by_id(id)                                        │
//! │     └── each call borrows its own pooled connection                    │
//! │                                                                         │
//! │  2. Connection-bound functions (conn: &mut SqliteConnection)           │
//! │     ProductRepository::try_take_sellable(&mut *tx, id, qty)            │
//! │     └── run inside a caller-owned transaction, so several              │
//! │         repositories commit or roll back together                      │
//! │                                                                         │
//! │  Inside a transaction ONLY form 2 may be used: the in-memory pool      │
//! │  has a single connection, and a pool-bound call would wait on it.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog, stock counters
//! - [`CustomerRepository`](customer::CustomerRepository) - Credit accounts
//! - [`OrderRepository`](order::OrderRepository) - Orders and order lines
//! - [`ReturnRepository`](return_doc::ReturnRepository) - Return documents and lines
//! - [`MovementRepository`](movement::MovementRepository) - Append-only stock ledger
//! - [`SequenceRepository`](sequence::SequenceRepository) - Document numbering

pub mod customer;
pub mod movement;
pub mod order;
pub mod product;
pub mod return_doc;
pub mod sequence;

use sqlx::{Sqlite, Transaction};
use tracing::error;

use crate::error::CommitResult;

/// Commits `tx` if `result` is Ok, rolls it back otherwise.
pub(crate) async fn finish<T>(
    tx: Transaction<'_, Sqlite>,
    result: CommitResult<T>,
) -> CommitResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
