//! # kassa-db: Storage Layer for Kassa
//!
//! SQLite storage for the point of sale and the two commit flows that
//! change stock and credit: committing an order and committing a return.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kassa Data Flow                                  │
//! │                                                                         │
//! │  Order entry / return entry (caller)                                   │
//! │       │  OrderRequest / ReturnRequest + Actor                          │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kassa-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Commit     │    │  Repositories │    │   Database   │  │   │
//! │  │   │  (commit/)    │───►│ (repository/) │───►│  (pool.rs)   │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ OrderCommit   │    │ Product       │    │ SqlitePool   │  │   │
//! │  │   │ ReturnCommit  │    │ Customer      │    │ WAL, FKs     │  │   │
//! │  │   │               │    │ Order, Return │    │ Migrations   │  │   │
//! │  │   │ plans via     │    │ Movement      │    │              │  │   │
//! │  │   │ kassa-core    │    │ Sequence      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (kassa.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven store configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and commit error types
//! - [`repository`] - Per-table access, including conditional updates
//! - [`commit`] - Order and return commit services
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kassa_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("kassa.db")).await?;
//!
//! let detail = db.order_commits().commit(&actor, &request).await?;
//! println!("{} committed", detail.order.order_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commit;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, StoreConfig};
pub use error::{CommitError, CommitResult, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Commit services
pub use commit::order::OrderCommitService;
pub use commit::returns::ReturnCommitService;

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::movement::MovementRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::return_doc::ReturnRepository;
pub use repository::sequence::SequenceRepository;
