//! Concurrent sellers against one on-disk store.
//!
//! Every test fires many commits at once through a multi-connection pool
//! and then checks the store-wide invariants: no negative stock, no credit
//! past the limit, no duplicate document numbers, ledger equal to counters.

use std::collections::HashSet;
use tempfile::TempDir;

use kassa_core::{
    Actor, Customer, Disposition, ErrorKind, NewCustomer, NewProduct, OrderDetail, OrderItemRequest,
    OrderRequest, PaymentMethod, Product, ReturnItemRequest, ReturnRequest, StockPool,
};
use kassa_db::{CommitResult, Database, DbConfig};

async fn open_store() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("kassa.db")).max_connections(8);
    let db = Database::new(config).await.unwrap();
    (dir, db)
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

async fn customer(db: &Database, limit_cents: i64) -> Customer {
    db.customers()
        .create(&NewCustomer {
            name: "Ana Souza".to_string(),
            credit_limit_cents: limit_cents,
        })
        .await
        .unwrap()
}

fn seller(n: usize) -> Actor {
    Actor::new(format!("seller-{}", n), format!("Seller {}", n))
}

fn cash_order(product_id: &str, quantity: i64) -> OrderRequest {
    OrderRequest {
        customer_id: None,
        items: vec![OrderItemRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_price_override_cents: None,
        }],
        payment_method: PaymentMethod::Cash,
        paid_amount_cents: None,
        document_type: None,
        notes: None,
    }
}

fn credit_order(customer_id: &str, product_id: &str, quantity: i64, paid_cents: i64) -> OrderRequest {
    OrderRequest {
        customer_id: Some(customer_id.to_string()),
        payment_method: PaymentMethod::Credit,
        paid_amount_cents: Some(paid_cents),
        ..cash_order(product_id, quantity)
    }
}

/// Commits every request concurrently, one task per request.
async fn commit_all(db: &Database, requests: Vec<OrderRequest>) -> Vec<CommitResult<OrderDetail>> {
    let mut handles = Vec::with_capacity(requests.len());
    for (n, request) in requests.into_iter().enumerate() {
        let service = db.order_commits();
        handles.push(tokio::spawn(async move { service.commit(&seller(n), &request).await }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_units_are_never_oversold() {
    let (_dir, db) = open_store().await;
    let x = product(&db, "X-1", 1000, 5).await;

    let results = commit_all(&db, (0..20).map(|_| cash_order(&x.id, 1)).collect()).await;

    let committed = results.iter().filter(|r| r.is_ok()).count() as i64;
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), ErrorKind::InsufficientStock | ErrorKind::ConflictRetryable),
            "unexpected failure: {}",
            err
        );
    }

    let after = db.products().get_by_id(&x.id).await.unwrap().unwrap();
    assert!(after.sellable_stock >= 0);
    assert!(committed <= 5);
    assert_eq!(after.sellable_stock, 5 - committed);
    assert_eq!(
        db.movements().net_quantity(&x.id, StockPool::Sellable).await.unwrap(),
        after.sellable_stock
    );
    assert_eq!(db.orders().count().await.unwrap(), committed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_get_distinct_numbers() {
    let (_dir, db) = open_store().await;
    let x = product(&db, "X-1", 500, 1000).await;

    let results = commit_all(&db, (0..16).map(|_| cash_order(&x.id, 2)).collect()).await;

    let numbers: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|detail| detail.order.order_number.clone())
        .collect();
    let distinct: HashSet<&String> = numbers.iter().collect();

    assert!(!numbers.is_empty());
    assert_eq!(distinct.len(), numbers.len());
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::ConflictRetryable, "unexpected failure: {}", err);
    }

    // Rolled-back commits give their number back, so the committed ones are
    // exactly 1..=N.
    let mut values: Vec<i64> = numbers
        .iter()
        .map(|n| kassa_core::numbering::parse_document_number(n).unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, (1..=numbers.len() as i64).collect::<Vec<_>>());

    let after = db.products().get_by_id(&x.id).await.unwrap().unwrap();
    assert_eq!(after.sellable_stock, 1000 - 2 * numbers.len() as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_credit_limit_holds_under_concurrency() {
    let (_dir, db) = open_store().await;
    let x = product(&db, "X-1", 3100, 100).await;
    let ana = customer(&db, 10_000).await;

    // Each order puts 30.00 on credit; only three fit under 100.00.
    let results = commit_all(
        &db,
        (0..10).map(|_| credit_order(&ana.id, &x.id, 1, 100)).collect(),
    )
    .await;

    let committed = results.iter().filter(|r| r.is_ok()).count() as i64;
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), ErrorKind::CreditLimitExceeded | ErrorKind::ConflictRetryable),
            "unexpected failure: {}",
            err
        );
    }

    let after = db.customers().get_by_id(&ana.id).await.unwrap().unwrap();
    assert!(committed <= 3);
    assert!(after.credit_used_cents <= after.credit_limit_cents);
    assert_eq!(after.credit_used_cents, 3000 * committed);

    let stock = db.products().get_by_id(&x.id).await.unwrap().unwrap();
    assert_eq!(stock.sellable_stock, 100 - committed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_stay_within_invoiced() {
    let (_dir, db) = open_store().await;
    let y = product(&db, "Y-1", 1000, 10).await;
    let ana = customer(&db, 100_000).await;

    let order = db
        .order_commits()
        .commit(&seller(0), &credit_order(&ana.id, &y.id, 4, 100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = db.return_commits();
        let request = ReturnRequest {
            document_id: order.order.id.clone(),
            returns: vec![ReturnItemRequest {
                product_id: y.id.clone(),
                quantity: 1,
                disposition: Disposition::Good,
                reason: None,
            }],
        };
        handles.push(tokio::spawn(async move { service.commit(&seller(n), &request).await }));
    }

    let mut committed = 0i64;
    let mut numbers = HashSet::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                committed += 1;
                assert!(numbers.insert(receipt.return_document.document.return_number));
            }
            Err(err) => assert!(
                matches!(err.kind(), ErrorKind::InvalidRequest | ErrorKind::ConflictRetryable),
                "unexpected failure: {}",
                err
            ),
        }
    }

    let returned = db.returns().returned_quantities(&order.order.id).await.unwrap();
    assert!(committed <= 4);
    assert_eq!(returned.get(&y.id).copied().unwrap_or(0), committed);

    let after = db.products().get_by_id(&y.id).await.unwrap().unwrap();
    assert_eq!(after.sellable_stock, 6 + committed);
    assert_eq!(
        db.movements().net_quantity(&y.id, StockPool::Sellable).await.unwrap(),
        after.sellable_stock
    );
}
