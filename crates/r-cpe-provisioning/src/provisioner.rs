//! ---
//! cpe_section: "05-provisioning-lifecycle"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Discovery-label stamping for provisioner templates."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::sync::Arc;

use r_cpe_common::Directive;
use r_cpe_model::{ObjectIdentity, Provisioner, TypeDescriptor};
use r_cpe_store::ResourceStore;
use tracing::{debug, info};

use crate::Result;

/// Stamps discovery labels onto provisioner templates.
///
/// The type descriptor is parsed exactly once per template: a provisioner
/// already carrying a `type` label is left untouched, which makes the pass
/// idempotent and the labels stable metadata from then on.
#[derive(Debug)]
pub struct ProvisionerReconciler<S> {
    store: Arc<S>,
}

impl<S: ResourceStore> ProvisionerReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Run one labeling pass for the provisioner at `id`.
    pub async fn reconcile(&self, id: &ObjectIdentity) -> Result<Directive> {
        let mut provisioner: Provisioner = match self.store.get(id).await {
            Ok(provisioner) => provisioner,
            Err(err) if err.is_not_found() => {
                debug!(provisioner = %id, "provisioner absent; nothing to label");
                return Ok(Directive::Done);
            }
            Err(err) => return Err(err.into()),
        };

        if provisioner.meta.labels.contains_key("type") {
            debug!(provisioner = %id, "discovery labels already stamped");
            return Ok(Directive::Done);
        }

        let descriptor: TypeDescriptor = provisioner.spec.descriptor.parse()?;
        provisioner
            .meta
            .labels
            .extend(descriptor.discovery_labels());

        match self.store.update(&provisioner).await {
            Ok(()) => {
                info!(
                    provisioner = %id,
                    descriptor = %provisioner.spec.descriptor,
                    "discovery labels stamped"
                );
                Ok(Directive::Done)
            }
            Err(err) if err.is_conflict() => {
                debug!(provisioner = %id, "provisioner changed underneath; re-reading");
                Ok(Directive::RequeueNow)
            }
            Err(err) => Err(err.into()),
        }
    }
}
