//! # Product Repository
//!
//! Catalog reads and the stock counters.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, check, then write an absolute value                   │
//! │     SELECT sellable_stock → 1      (seller A and seller B both see 1)  │
//! │     UPDATE ... SET sellable_stock = 0                                  │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional delta statement                           │
//! │     UPDATE products SET sellable_stock = sellable_stock - 1            │
//! │     WHERE id = ? AND sellable_stock >= 1                               │
//! │     rows_affected == 0  →  someone else took the stock                 │
//! │                                                                         │
//! │  Every counter change is paired with a StockMovement in the same       │
//! │  transaction.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CommitError, CommitResult, DbError, DbResult};
use crate::repository::finish;
use crate::repository::movement::MovementRepository;
use kassa_core::validation::{
    validate_initial_stock, validate_name, validate_note, validate_price_cents, validate_sku,
    validate_stock_adjustment,
};
use kassa_core::{
    CoreError, MovementReason, MovementType, NewProduct, Product, StockMovement, StockPool,
};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create(&NewProduct { sku: "MUG-01".into(), ... }).await?;
/// let found = repo.get_by_sku("MUG-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit_price_cents, sellable_stock, defective_stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit_price_cents, sellable_stock, defective_stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Loads every product in `ids` that exists, keyed by id.
    ///
    /// Missing ids are simply absent from the map; the caller decides
    /// whether that is an error.
    pub async fn get_many(&self, ids: &[&str]) -> DbResult<HashMap<String, Product>> {
        let mut found = HashMap::new();
        for &id in ids {
            if found.contains_key(id) {
                continue;
            }
            if let Some(product) = self.get_by_id(id).await? {
                found.insert(product.id.clone(), product);
            }
        }
        Ok(found)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit_price_cents, sellable_stock, defective_stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a catalog product.
    ///
    /// Opening stock goes in as an `INITIAL_STOCK` movement in the same
    /// transaction as the insert.
    ///
    /// ## Returns
    /// * `Err(CommitError::Rejected)` - Invalid input or SKU already taken
    pub async fn create(&self, input: &NewProduct) -> CommitResult<Product> {
        validate_sku(&input.sku)?;
        validate_name("name", &input.name)?;
        validate_price_cents(input.unit_price_cents)?;
        validate_initial_stock(input.initial_stock)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            unit_price_cents: input.unit_price_cents,
            sellable_stock: input.initial_stock,
            defective_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;
        let result: CommitResult<Product> = async {
            Self::insert(&mut tx, &product).await?;
            if product.sellable_stock > 0 {
                MovementRepository::append(
                    &mut tx,
                    &product.id,
                    MovementType::In,
                    StockPool::Sellable,
                    product.sellable_stock,
                    &MovementReason::InitialStock,
                )
                .await?;
            }
            Ok(product)
        }
        .await;

        let product = finish(tx, result).await.map_err(|e| match e {
            CommitError::Storage(DbError::UniqueViolation { field, value }) if field == "sku" => {
                CommitError::Rejected(CoreError::invalid(format!("SKU {} already exists", value)))
            }
            other => other,
        })?;
        info!(id = %product.id, sku = %product.sku, stock = product.sellable_stock, "Product created");
        Ok(product)
    }

    /// Manually adjusts one stock pool by `delta` (positive or negative).
    ///
    /// Refuses to take a pool below zero with `InsufficientStock`. A zero
    /// delta, or one past `MAX_STOCK_CHANGE` either way, is `InvalidRequest`.
    /// Returns the ledger entry written.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        pool: StockPool,
        delta: i64,
        note: Option<&str>,
    ) -> CommitResult<StockMovement> {
        validate_stock_adjustment(delta)?;
        validate_note("note", note)?;

        debug!(product_id = %product_id, ?pool, delta, "Adjusting stock");

        let mut tx = self.pool.begin().await?;
        let result: CommitResult<StockMovement> = async {
            let (movement_type, quantity) = if delta > 0 {
                (MovementType::In, delta)
            } else {
                (MovementType::Out, -delta)
            };

            let applied = match movement_type {
                MovementType::In => Self::add_to_pool(&mut tx, product_id, pool, quantity).await?,
                MovementType::Out => {
                    Self::try_remove_from_pool(&mut tx, product_id, pool, quantity).await?
                }
            };

            if !applied {
                let current = Self::fetch(&mut tx, product_id)
                    .await?
                    .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
                return Err(CommitError::Rejected(CoreError::InsufficientStock {
                    sku: current.sku.clone(),
                    available: pool_level(&current, pool),
                    requested: quantity,
                }));
            }

            let movement = MovementRepository::append(
                &mut tx,
                product_id,
                movement_type,
                pool,
                quantity,
                &MovementReason::ManualAdjustment {
                    note: note.map(str::to_string),
                },
            )
            .await?;
            Ok(movement)
        }
        .await;

        let movement = finish(tx, result).await?;
        info!(product_id = %product_id, ?pool, delta, "Stock adjusted");
        Ok(movement)
    }

    /// Deactivates a product (soft delete).
    ///
    /// Inactive products cannot be sold, but past orders still reference them
    /// and they can still be returned.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // =========================================================================
    // Connection-bound (inside a caller's transaction)
    // =========================================================================

    /// Inserts a product row.
    pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, unit_price_cents, sellable_stock, defective_stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.unit_price_cents)
        .bind(product.sellable_stock)
        .bind(product.defective_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("sku") => {
                DbError::duplicate("sku", &product.sku)
            }
            other => other,
        })?;

        Ok(())
    }

    /// Reads a product through the caller's connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit_price_cents, sellable_stock, defective_stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Takes `quantity` units out of sellable stock if that many are there.
    ///
    /// ## Returns
    /// * `Ok(true)` - Decremented
    /// * `Ok(false)` - Not enough stock (or no such product); nothing changed
    pub async fn try_take_sellable(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        Self::try_remove_from_pool(conn, id, StockPool::Sellable, quantity).await
    }

    /// Decrements a pool by `quantity` only when it holds at least that many.
    pub async fn try_remove_from_pool(
        conn: &mut SqliteConnection,
        id: &str,
        pool: StockPool,
        quantity: i64,
    ) -> DbResult<bool> {
        let sql = match pool {
            StockPool::Sellable => {
                r#"
                UPDATE products
                SET sellable_stock = sellable_stock - ?2, updated_at = ?3
                WHERE id = ?1 AND sellable_stock >= ?2
                "#
            }
            StockPool::Defective => {
                r#"
                UPDATE products
                SET defective_stock = defective_stock - ?2, updated_at = ?3
                WHERE id = ?1 AND defective_stock >= ?2
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Increments a pool by `quantity`. `Ok(false)` if the product is missing.
    pub async fn add_to_pool(
        conn: &mut SqliteConnection,
        id: &str,
        pool: StockPool,
        quantity: i64,
    ) -> DbResult<bool> {
        let sql = match pool {
            StockPool::Sellable => {
                "UPDATE products SET sellable_stock = sellable_stock + ?2, updated_at = ?3 WHERE id = ?1"
            }
            StockPool::Defective => {
                "UPDATE products SET defective_stock = defective_stock + ?2, updated_at = ?3 WHERE id = ?1"
            }
        };

        let result = sqlx::query(sql)
            .bind(id)
            .bind(quantity)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Current level of `pool` on `product`.
pub fn pool_level(product: &Product, pool: StockPool) -> i64 {
    match pool {
        StockPool::Sellable => product.sellable_stock,
        StockPool::Defective => product.defective_stock,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use kassa_core::validation::MAX_STOCK_CHANGE;
    use kassa_core::{ErrorKind, MovementSource, NewProduct, StockPool};

    fn mug(initial_stock: i64) -> NewProduct {
        NewProduct {
            sku: "MUG-01".to_string(),
            name: "Ceramic mug".to_string(),
            unit_price_cents: 1250,
            initial_stock,
        }
    }

    #[tokio::test]
    async fn test_create_records_initial_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(12)).await.unwrap();

        let found = db.products().get_by_sku("MUG-01").await.unwrap().unwrap();
        assert_eq!(found.id, product.id);
        assert_eq!(found.sellable_stock, 12);

        let movements = db.movements().list_for_product(&product.id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].source, MovementSource::InitialStock);
        assert_eq!(movements[0].quantity, 12);
    }

    #[tokio::test]
    async fn test_create_without_stock_writes_no_movement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(0)).await.unwrap();

        let movements = db.movements().list_for_product(&product.id, 10).await.unwrap();
        assert!(movements.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&mug(1)).await.unwrap();

        let err = db.products().create(&mug(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = mug(1);
        input.unit_price_cents = -5;

        let err = db.products().create(&input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_adjust_stock_both_ways() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(5)).await.unwrap();

        db.products()
            .adjust_stock(&product.id, StockPool::Sellable, 3, Some("found in back room"))
            .await
            .unwrap();
        let movement = db
            .products()
            .adjust_stock(&product.id, StockPool::Sellable, -8, None)
            .await
            .unwrap();
        assert_eq!(movement.quantity, 8);
        assert_eq!(movement.signed_quantity(), -8);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.sellable_stock, 0);
        assert_eq!(
            db.movements()
                .net_quantity(&product.id, StockPool::Sellable)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_adjust_stock_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(2)).await.unwrap();

        let err = db
            .products()
            .adjust_stock(&product.id, StockPool::Defective, -1, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.defective_stock, 0);
        assert_eq!(db.movements().list_for_product(&product.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_out_of_range_deltas() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(5)).await.unwrap();

        for delta in [0, i64::MIN, i64::MAX, MAX_STOCK_CHANGE + 1, -MAX_STOCK_CHANGE - 1] {
            let err = db
                .products()
                .adjust_stock(&product.id, StockPool::Sellable, delta, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "delta {}", delta);
        }

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.sellable_stock, 5);
        assert_eq!(db.movements().list_for_product(&product.id, 10).await.unwrap().len(), 1);

        db.products()
            .adjust_stock(&product.id, StockPool::Sellable, MAX_STOCK_CHANGE, None)
            .await
            .unwrap();
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.sellable_stock, MAX_STOCK_CHANGE + 5);
    }

    #[tokio::test]
    async fn test_adjust_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .products()
            .adjust_stock("missing", StockPool::Sellable, 4, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_deactivate_and_list_active() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&mug(1)).await.unwrap();

        db.products().deactivate(&product.id).await.unwrap();
        assert!(db.products().list_active(10).await.unwrap().is_empty());
        assert!(db.products().deactivate("missing").await.is_err());

        let still_there = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!still_there.is_active);
    }
}
