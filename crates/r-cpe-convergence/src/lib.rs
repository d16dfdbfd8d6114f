//! ---
//! cpe_section: "04-convergence-control"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Convergence reconcilers and desired-state builders."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Convergence reconcilers driving managed services and standalone databases
//! toward their declared state, one mutation per pass, in fixed dependency
//! order.

use r_cpe_store::StoreError;
use thiserror::Error;

pub mod builders;
mod database;
mod ensure;
mod service;

pub use database::DatabaseReconciler;
pub use service::ServiceReconciler;

/// Shared result type for convergence passes.
pub type Result<T> = std::result::Result<T, ConvergenceError>;

/// Failures surfaced to the scheduling substrate, which applies its own
/// backoff before the next invocation. Expected store outcomes (`NotFound`,
/// `AlreadyExists` on create, `Conflict` on update) are absorbed into
/// directives and never appear here.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// A store round trip failed for a reason the pass cannot absorb.
    #[error("resource store operation failed: {0}")]
    Store(#[from] StoreError),
}
