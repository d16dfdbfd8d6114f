//! ---
//! cpe_section: "05-provisioning-lifecycle"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Provisioning lifecycle reconcilers."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Provisioning side of the engine: discovery-label stamping for provisioner
//! templates and the per-request lifecycle state machine that delegates the
//! actual provisioning action to a one-shot batch job.

use r_cpe_model::DescriptorError;
use r_cpe_store::StoreError;
use thiserror::Error;

mod provisioner;
mod request;

pub use provisioner::ProvisionerReconciler;
pub use request::{provisioning_job, RequestReconciler};

/// Shared result type for provisioning passes.
pub type Result<T> = std::result::Result<T, ProvisioningError>;

/// Failures surfaced to the scheduling substrate for backoff. None of these
/// abort processing of other resources; partial progress is resumable.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The named provisioner template does not exist yet. A waiting
    /// condition, not fatal; the template may appear later.
    #[error("provisioner {name} not found for request {request}")]
    ProvisionerMissing { name: String, request: String },
    /// The provisioner carries a malformed type descriptor. Surfaced every
    /// pass until corrected; the resource stays unlabeled.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// A store round trip failed for a reason the pass cannot absorb.
    #[error("resource store operation failed: {0}")]
    Store(#[from] StoreError),
}
