//! # Customer Repository
//!
//! Customer directory and credit accounts.
//!
//! `credit_used_cents` only ever grows through [`CustomerRepository::try_extend_credit`],
//! a single conditional statement that refuses blocked customers and any
//! increment that would pass the limit.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CommitError, CommitResult, DbError, DbResult};
use kassa_core::validation::{validate_credit_limit_cents, validate_name};
use kassa_core::{CoreError, Customer, Money, NewCustomer};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, credit_limit_cents, credit_used_cents, is_blocked,
                   created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Registers a customer with an empty credit account.
    pub async fn create(&self, input: &NewCustomer) -> CommitResult<Customer> {
        validate_name("name", &input.name)?;
        validate_credit_limit_cents(input.credit_limit_cents)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            credit_limit_cents: input.credit_limit_cents,
            credit_used_cents: 0,
            is_blocked: false,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, credit_limit_cents, credit_used_cents, is_blocked,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.credit_limit_cents)
        .bind(customer.credit_used_cents)
        .bind(customer.is_blocked)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, limit = %customer.credit_limit(), "Customer created");
        Ok(customer)
    }

    /// Blocks or unblocks a customer's credit.
    pub async fn set_blocked(&self, id: &str, blocked: bool) -> DbResult<()> {
        debug!(id = %id, blocked, "Setting customer blocked flag");

        let result = sqlx::query(
            "UPDATE customers SET is_blocked = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(blocked)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    /// Changes a customer's credit limit.
    ///
    /// Refused (`InvalidRequest`) when the new limit is below what the
    /// customer already owes.
    pub async fn set_credit_limit(&self, id: &str, limit_cents: i64) -> CommitResult<Customer> {
        validate_credit_limit_cents(limit_cents)?;

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET credit_limit_cents = ?2, updated_at = ?3
            WHERE id = ?1 AND credit_used_cents <= ?2
            "#,
        )
        .bind(id)
        .bind(limit_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let customer = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CommitError::Rejected(CoreError::invalid(format!(
                "credit limit {} is below credit used {}",
                Money::from_cents(limit_cents),
                customer.credit_used()
            ))));
        }

        info!(id = %id, limit = %customer.credit_limit(), "Credit limit changed");
        Ok(customer)
    }

    // =========================================================================
    // Connection-bound (inside a caller's transaction)
    // =========================================================================

    /// Reads a customer through the caller's connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, credit_limit_cents, credit_used_cents, is_blocked,
                   created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(customer)
    }

    /// Adds `amount` to the customer's used credit if they are not blocked
    /// and stay within their limit.
    ///
    /// ## Returns
    /// * `Ok(true)` - Credit extended
    /// * `Ok(false)` - Blocked, over limit, or unknown customer; nothing changed
    pub async fn try_extend_credit(
        conn: &mut SqliteConnection,
        id: &str,
        amount: Money,
    ) -> DbResult<bool> {
        debug!(id = %id, amount = %amount, "Extending credit");

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET credit_used_cents = credit_used_cents + ?2, updated_at = ?3
            WHERE id = ?1
              AND is_blocked = 0
              AND credit_used_cents + ?2 <= credit_limit_cents
            "#,
        )
        .bind(id)
        .bind(amount.cents())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
