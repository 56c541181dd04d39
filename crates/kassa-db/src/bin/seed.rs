//! # Seed Data Generator
//!
//! Populates a store database with a small catalog, a few credit customers
//! and one credit-note order with a partial return, for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./kassa.db (or $KASSA_DATABASE_PATH)
//! cargo run -p kassa-db --bin seed
//!
//! # Specify database path and catalog size
//! cargo run -p kassa-db --bin seed -- --db ./data/kassa.db --count 200
//!
//! # More output
//! RUST_LOG=kassa_db=debug cargo run -p kassa-db --bin seed
//! ```
//!
//! Each product has:
//! - Unique SKU: `{CATEGORY}-{INDEX}`
//! - Price between 1.99 and 9.99
//! - Sellable stock between 0 and 100, recorded as an initial-stock movement

use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kassa_core::{
    Actor, Disposition, NewCustomer, NewProduct, OrderItemRequest, OrderRequest, PaymentMethod,
    ReturnItemRequest, ReturnRequest,
};
use kassa_db::{Database, StoreConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &["Cola", "Lemon Soda", "Mineral Water", "Orange Juice", "Iced Tea", "Coffee Beans"],
    ),
    (
        "SNK",
        &["Salted Chips", "Chocolate Bar", "Gummy Bears", "Pretzels", "Peanuts", "Cookies"],
    ),
    (
        "HRD",
        &["Hammer", "Screwdriver Set", "Wood Screws", "Tape Measure", "Work Gloves", "Padlock"],
    ),
    (
        "HOM",
        &["Dish Soap", "Sponges", "Light Bulb", "Batteries AA", "Trash Bags", "Candles"],
    ),
];

/// Credit customers: (name, credit limit in cents)
const CUSTOMERS: &[(&str, i64)] = &[
    ("Ana Souza", 50_000),
    ("Bruno Lima", 20_000),
    ("Carla Mendes", 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = StoreConfig::from_env()?;
    let mut count: usize = CATEGORIES.iter().map(|(_, names)| names.len()).sum();

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kassa Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate");
                println!("  -d, --db <PATH>    Database file path (default: $KASSA_DATABASE_PATH or ./kassa.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(database = %config.database_path.display(), products = count, "Seeding store");

    let db = Database::new(config.db_config()).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    // Catalog
    let mut products = Vec::new();
    let mut index = 0usize;
    'catalog: for (category, names) in CATEGORIES {
        for name in names.iter() {
            if index >= count {
                break 'catalog;
            }

            let input = NewProduct {
                sku: format!("{}-{:04}", category, index + 1),
                name: name.to_string(),
                unit_price_cents: 199 + ((index * 37) % 801) as i64,
                initial_stock: (index * 13 % 101) as i64,
            };

            match db.products().create(&input).await {
                Ok(product) => products.push(product),
                Err(e) => warn!(sku = %input.sku, error = %e, "Failed to create product"),
            }
            index += 1;
        }
    }
    info!(created = products.len(), "Catalog seeded");

    // Customers
    let mut customers = Vec::new();
    for (name, limit) in CUSTOMERS {
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: name.to_string(),
                credit_limit_cents: *limit,
            })
            .await?;
        customers.push(customer);
    }
    info!(created = customers.len(), "Customers seeded");

    // One credit-note order and a partial return against it
    let in_stock: Vec<_> = products.iter().filter(|p| p.sellable_stock >= 2).take(2).collect();
    let (Some(customer), false) = (customers.first(), in_stock.is_empty()) else {
        info!("Seed complete (no sample order)");
        return Ok(());
    };

    let clerk = Actor::new("seed", "Seed Script");
    let order = db
        .order_commits()
        .commit(
            &clerk,
            &OrderRequest {
                customer_id: Some(customer.id.clone()),
                items: in_stock
                    .iter()
                    .map(|p| OrderItemRequest {
                        product_id: p.id.clone(),
                        quantity: 2,
                        unit_price_override_cents: None,
                    })
                    .collect(),
                payment_method: PaymentMethod::Credit,
                paid_amount_cents: Some(100),
                document_type: None,
                notes: Some("seeded sample order".to_string()),
            },
        )
        .await?;

    let receipt = db
        .return_commits()
        .commit(
            &clerk,
            &ReturnRequest {
                document_id: order.order.id.clone(),
                returns: vec![ReturnItemRequest {
                    product_id: in_stock[0].id.clone(),
                    quantity: 1,
                    disposition: Disposition::Defective,
                    reason: Some("cracked packaging".to_string()),
                }],
            },
        )
        .await?;

    info!(
        order_number = %order.order.order_number,
        return_number = %receipt.return_document.document.return_number,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
