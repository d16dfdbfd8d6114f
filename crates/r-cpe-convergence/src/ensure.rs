//! ---
//! cpe_section: "04-convergence-control"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Tier convergence helpers shared by the reconcilers."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::time::Duration;

use r_cpe_common::Directive;
use r_cpe_model::{Endpoint, ExposureMode, Object, ObjectIdentity};
use r_cpe_store::ResourceStore;
use tracing::{debug, info};

use crate::Result;

/// Converge one create-only tier.
///
/// Returns `Some(directive)` when the pass issued its one allowed mutation
/// and must stop, `None` when the tier already matches and the caller may
/// proceed to the next one. The builder closure only runs when the child is
/// absent.
pub(crate) async fn ensure_present<S, T, F>(
    store: &S,
    id: &ObjectIdentity,
    build: F,
) -> Result<Option<Directive>>
where
    S: ResourceStore,
    T: Object,
    F: FnOnce() -> T,
{
    match store.get::<T>(id).await {
        Ok(_) => Ok(None),
        Err(err) if err.is_not_found() => {
            let desired = build();
            info!(kind = T::KIND, object = %id, "creating child object");
            create_and_requeue(store, &desired).await
        }
        Err(err) => Err(err.into()),
    }
}

/// Converge an endpoint tier whose exposure mode is kept in sync with the
/// parent spec: create when absent, patch the drifted field when present.
pub(crate) async fn ensure_endpoint<S, F>(
    store: &S,
    id: &ObjectIdentity,
    desired_exposure: ExposureMode,
    cooldown: Duration,
    build: F,
) -> Result<Option<Directive>>
where
    S: ResourceStore,
    F: FnOnce() -> Endpoint,
{
    match store.get::<Endpoint>(id).await {
        Ok(mut endpoint) => {
            if endpoint.exposure == desired_exposure {
                return Ok(None);
            }
            info!(
                object = %id,
                current = ?endpoint.exposure,
                desired = ?desired_exposure,
                "patching drifted exposure mode"
            );
            endpoint.exposure = desired_exposure;
            match store.update(&endpoint).await {
                // Give the mutation time to propagate before the next
                // comparison.
                Ok(()) => Ok(Some(Directive::RequeueAfter(cooldown))),
                Err(err) if err.is_conflict() => {
                    debug!(object = %id, "endpoint changed underneath; re-reading");
                    Ok(Some(Directive::RequeueNow))
                }
                Err(err) => Err(err.into()),
            }
        }
        Err(err) if err.is_not_found() => {
            let desired = build();
            info!(kind = Endpoint::KIND, object = %id, "creating child object");
            create_and_requeue(store, &desired).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn create_and_requeue<S, T>(store: &S, desired: &T) -> Result<Option<Directive>>
where
    S: ResourceStore,
    T: Object,
{
    match store.create(desired).await {
        Ok(()) => Ok(Some(Directive::RequeueNow)),
        Err(err) if err.is_already_exists() => {
            // A concurrent creator won the race; success-equivalent, requeue
            // to re-read.
            debug!(kind = T::KIND, object = %desired.identity(), "child already created concurrently");
            Ok(Some(Directive::RequeueNow))
        }
        Err(err) => Err(err.into()),
    }
}
