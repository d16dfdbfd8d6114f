//! ---
//! cpe_section: "04-convergence-control"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Convergence reconciler for standalone databases."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_cpe_common::{ConvergenceConfig, Directive};
use r_cpe_model::{Credential, Database, ObjectIdentity, StorageClaim, Workload};
use r_cpe_store::ResourceStore;
use tracing::debug;

use crate::builders;
use crate::ensure::{ensure_endpoint, ensure_present};
use crate::Result;

/// Drives a standalone database toward its declared state.
///
/// Same pipeline as the service reconciler over four tiers: storage claim,
/// credential, workload, endpoint, with the endpoint's exposure mode kept in
/// sync with the spec (cluster-internal when the spec leaves it unset).
#[derive(Debug)]
pub struct DatabaseReconciler<S> {
    store: Arc<S>,
    drift_cooldown: Duration,
}

impl<S: ResourceStore> DatabaseReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &ConvergenceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: &ConvergenceConfig) -> Self {
        Self {
            store,
            drift_cooldown: config.drift_cooldown,
        }
    }

    /// Run one convergence pass for the database at `id`.
    pub async fn reconcile(&self, id: &ObjectIdentity) -> Result<Directive> {
        let database: Database = match self.store.get(id).await {
            Ok(database) => database,
            Err(err) if err.is_not_found() => {
                debug!(database = %id, "database absent; nothing to converge");
                return Ok(Directive::Done);
            }
            Err(err) => return Err(err.into()),
        };
        let store = self.store.as_ref();

        if let Some(directive) =
            ensure_present::<_, StorageClaim, _>(store, id, || builders::database_claim(&database))
                .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_present::<_, Credential, _>(store, id, || {
            builders::database_credential(&database, &builders::generate_password())
        })
        .await?
        {
            return Ok(directive);
        }
        if let Some(directive) =
            ensure_present::<_, Workload, _>(store, id, || builders::database_workload(&database))
                .await?
        {
            return Ok(directive);
        }
        if let Some(directive) = ensure_endpoint(
            store,
            id,
            database.spec.exposure.unwrap_or_default(),
            self.drift_cooldown,
            || builders::database_endpoint(&database),
        )
        .await?
        {
            return Ok(directive);
        }

        debug!(database = %id, "database converged");
        Ok(Directive::Done)
    }
}
