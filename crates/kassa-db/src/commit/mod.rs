//! # Commit Services
//!
//! The two write flows of the point of sale: committing an order and
//! committing a return. Each runs in two phases.
//!
//! ## Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Commit = Plan + Atomic Phase                         │
//! │                                                                         │
//! │  1. PLAN (no writes)                                                   │
//! │     ├── read products / customer / document through the pool          │
//! │     └── kassa_core::plan_order / plan_return                           │
//! │         └── Err → CommitError::Rejected, nothing touched               │
//! │                                                                         │
//! │  2. ATOMIC PHASE (one transaction)                                     │
//! │     ├── allocate document number      (UPDATE ... RETURNING)           │
//! │     ├── insert header + lines                                          │
//! │     ├── conditional stock / credit updates                             │
//! │     │   └── 0 rows → CommitError::Conflict, ROLLBACK                   │
//! │     ├── append stock movements                                         │
//! │     └── COMMIT                                                         │
//! │         └── storage error → CommitError::Storage, ROLLBACK             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan phase catches almost every bad request. The conditional
//! updates exist for the requests that raced another seller between the
//! two phases; they re-check the same rule against the live row.

pub mod order;
pub mod returns;

use tracing::{error, warn};

use crate::error::CommitError;
use kassa_core::validation::validate_name;
use kassa_core::Actor;

/// Checks that the acting user is identified.
fn validate_actor(actor: &Actor) -> Result<(), CommitError> {
    validate_name("seller", &actor.user_id)?;
    Ok(())
}

/// Logs a failed commit at the level its kind deserves.
fn report_failure(flow: &'static str, actor: &Actor, err: &CommitError) {
    match err {
        CommitError::Rejected(cause) => {
            warn!(flow, user_id = %actor.user_id, kind = ?cause.kind(), error = %cause, "Commit rejected");
        }
        CommitError::Conflict(cause) => {
            warn!(flow, user_id = %actor.user_id, error = %cause, "Commit lost a race, rolled back");
        }
        CommitError::Storage(db_err) if db_err.is_contention() => {
            warn!(flow, user_id = %actor.user_id, error = %db_err, "Commit hit a busy database, rolled back");
        }
        CommitError::Storage(db_err) => {
            error!(flow, user_id = %actor.user_id, error = %db_err, "Commit failed in storage, rolled back");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
