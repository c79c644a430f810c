//! Background jobs executed outside the request path.
//!
//! Jobs are idempotent and fault-tolerant: a failing portfolio or symbol is
//! logged and skipped, never aborting the run for the others.

pub mod dca_cycle_job;

/// Outcome summary returned by every job for logging and the trigger route.
#[derive(Debug, serde::Serialize)]
pub struct JobResult {
    pub items_processed: usize,
    pub items_failed: usize,
}
