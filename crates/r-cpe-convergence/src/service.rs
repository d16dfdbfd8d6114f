//! ---
//! cpe_section: "04-convergence-control"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Convergence reconciler for managed services."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_cpe_common::{ConvergenceConfig, Directive};
use r_cpe_model::{Credential, Endpoint, ManagedService, ObjectIdentity, StorageClaim, Workload};
use r_cpe_store::ResourceStore;
use tracing::debug;

use crate::builders;
use crate::ensure::{ensure_endpoint, ensure_present};
use crate::Result;

/// Drives a managed service's dependency chain toward its declared state.
///
/// Each pass walks the tiers in fixed order and issues at most one mutation:
/// backing database claim, shared credential, backing database workload and
/// endpoint, identity workload and endpoint, primary workload, then the web
/// and gateway endpoints whose exposure modes are kept in sync with the spec.
/// The substrate serializes passes per identity; distinct identities may
/// reconcile concurrently.
#[derive(Debug)]
pub struct ServiceReconciler<S> {
    store: Arc<S>,
    drift_cooldown: Duration,
}

impl<S: ResourceStore> ServiceReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &ConvergenceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: &ConvergenceConfig) -> Self {
        Self {
            store,
            drift_cooldown: config.drift_cooldown,
        }
    }

    /// Run one convergence pass for the service at `id`.
    pub async fn reconcile(&self, id: &ObjectIdentity) -> Result<Directive> {
        let service: ManagedService = match self.store.get(id).await {
            Ok(service) => service,
            Err(err) if err.is_not_found() => {
                // Deleted; owned children are garbage collected by the store.
                debug!(service = %id, "managed service absent; nothing to converge");
                return Ok(Directive::Done);
            }
            Err(err) => return Err(err.into()),
        };
        let store = self.store.as_ref();

        let backing = id.sibling(builders::backing_database_name(&service));
        if let Some(directive) = ensure_present::<_, StorageClaim, _>(store, &backing, || {
            builders::backing_database_claim(&service)
        })
        .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_present::<_, Credential, _>(store, id, || {
            builders::service_credential(&service, &builders::generate_password())
        })
        .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_present::<_, Workload, _>(store, &backing, || {
            builders::backing_database_workload(&service)
        })
        .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_present::<_, Endpoint, _>(store, &backing, || {
            builders::backing_database_endpoint(&service)
        })
        .await?
        {
            return Ok(directive);
        }

        let identity = id.sibling(builders::identity_name(&service));
        if let Some(directive) = ensure_present::<_, Workload, _>(store, &identity, || {
            builders::identity_workload(&service)
        })
        .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_present::<_, Endpoint, _>(store, &identity, || {
            builders::identity_endpoint(&service)
        })
        .await?
        {
            return Ok(directive);
        }

        if let Some(directive) =
            ensure_present::<_, Workload, _>(store, id, || builders::primary_workload(&service))
                .await?
        {
            return Ok(directive);
        }

        let web = id.sibling(builders::web_endpoint_name(&service));
        if let Some(directive) = ensure_endpoint(
            store,
            &web,
            service.spec.web_exposure,
            self.drift_cooldown,
            || builders::web_endpoint(&service),
        )
        .await?
        {
            return Ok(directive);
        }

        let gateway = id.sibling(builders::gateway_endpoint_name(&service));
        if let Some(directive) = ensure_endpoint(
            store,
            &gateway,
            service.spec.gateway_exposure,
            self.drift_cooldown,
            || builders::gateway_endpoint(&service),
        )
        .await?
        {
            return Ok(directive);
        }

        debug!(service = %id, "managed service converged");
        Ok(Directive::Done)
    }
}
