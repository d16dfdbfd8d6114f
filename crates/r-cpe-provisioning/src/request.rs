//! ---
//! cpe_section: "05-provisioning-lifecycle"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Lifecycle state machine for provisioning requests."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_cpe_common::{ConvergenceConfig, Directive};
use r_cpe_model::{
    BatchJob, JobConditionKind, JobStatus, LifecycleStage, Object, ObjectIdentity, ObjectMeta,
    OwnerRef, Provisioner, ProvisioningRequest, RestartPolicy,
};
use r_cpe_store::ResourceStore;
use tracing::{debug, info, warn};

use crate::{ProvisioningError, Result};

/// Build the one-shot job delegated by a provisioning request.
///
/// The job shares the request's identity, is owned by it for cascade
/// deletion, and runs the provisioner's image with
/// `["create", <resource address>, <resource name>, <init args...>]`.
/// `backoff_limit` is zero: a failed job is terminal and retry policy stays
/// with whoever recreates the request.
pub fn provisioning_job(request: &ProvisioningRequest, provisioner: &Provisioner) -> BatchJob {
    let mut args = vec![
        "create".to_owned(),
        request.spec.resource_address.clone(),
        request.spec.resource_name.clone(),
    ];
    args.extend(request.spec.init_args.iter().cloned());

    BatchJob {
        meta: ObjectMeta::named(&request.meta.name, &request.meta.namespace)
            .owned_by(OwnerRef::to(request)),
        image: provisioner.spec.image.clone(),
        args,
        env: provisioner.spec.env.clone(),
        restart_policy: RestartPolicy::Never,
        backoff_limit: 0,
        status: JobStatus::default(),
    }
}

/// Lifecycle state machine for provisioning requests.
///
/// `Unset -> Creating` happens exactly once and creates the delegated job;
/// `Creating -> {Ready, Failed}` follows the job's terminal condition and is
/// final. Stage advancement goes through the status write path only, so it
/// never races a concurrent spec edit.
#[derive(Debug)]
pub struct RequestReconciler<S> {
    store: Arc<S>,
    job_poll_interval: Duration,
}

impl<S: ResourceStore> RequestReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &ConvergenceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: &ConvergenceConfig) -> Self {
        Self {
            store,
            job_poll_interval: config.job_poll_interval,
        }
    }

    /// Run one lifecycle pass for the request at `id`.
    pub async fn reconcile(&self, id: &ObjectIdentity) -> Result<Directive> {
        let request: ProvisioningRequest = match self.store.get(id).await {
            Ok(request) => request,
            Err(err) if err.is_not_found() => {
                debug!(request = %id, "provisioning request absent; nothing to drive");
                return Ok(Directive::Done);
            }
            Err(err) => return Err(err.into()),
        };

        match request.status.stage {
            LifecycleStage::Unset => self.begin(request).await,
            LifecycleStage::Creating => self.observe(request).await,
            LifecycleStage::Ready | LifecycleStage::Failed => {
                debug!(request = %id, stage = %request.status.stage, "request is terminal");
                Ok(Directive::Done)
            }
        }
    }

    /// First pass: resolve the template, advance to `Creating`, create the
    /// delegated job.
    async fn begin(&self, mut request: ProvisioningRequest) -> Result<Directive> {
        let provisioner_id = ObjectIdentity::new(
            request.spec.provisioner.clone(),
            request.meta.namespace.clone(),
        );
        let provisioner: Provisioner = match self.store.get(&provisioner_id).await {
            Ok(provisioner) => provisioner,
            Err(err) if err.is_not_found() => {
                warn!(
                    request = %request.identity(),
                    provisioner = %provisioner_id,
                    "provisioner not found; request stays unset"
                );
                request.status.message =
                    Some(format!("waiting for provisioner {}", provisioner_id.name));
                match self.store.update_status(&request).await {
                    Ok(()) => {}
                    Err(err) if err.is_conflict() => {}
                    Err(err) => return Err(err.into()),
                }
                return Err(ProvisioningError::ProvisionerMissing {
                    name: provisioner_id.name,
                    request: request.meta.name,
                });
            }
            Err(err) => return Err(err.into()),
        };

        // Persist the stage before creating the job so a crash between the
        // two writes cannot spawn a second job on the retry.
        request.status.stage = LifecycleStage::Creating;
        request.status.message = None;
        match self.store.update_status(&request).await {
            Ok(()) => {}
            Err(err) if err.is_conflict() => return Ok(Directive::RequeueNow),
            Err(err) => return Err(err.into()),
        }

        let job = provisioning_job(&request, &provisioner);
        match self.store.create(&job).await {
            Ok(()) => {
                info!(
                    request = %request.identity(),
                    image = %job.image,
                    "delegated provisioning job created"
                );
            }
            Err(err) if err.is_already_exists() => {
                debug!(request = %request.identity(), "delegated job already present");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(Directive::RequeueNow)
    }

    /// Poll pass: inspect the delegated job's terminal conditions and settle
    /// the stage accordingly.
    async fn observe(&self, mut request: ProvisioningRequest) -> Result<Directive> {
        let job: BatchJob = match self.store.get(&request.identity()).await {
            Ok(job) => job,
            Err(err) if err.is_not_found() => {
                debug!(request = %request.identity(), "delegated job not visible yet");
                return Ok(Directive::RequeueAfter(self.job_poll_interval));
            }
            Err(err) => return Err(err.into()),
        };

        match job.terminal_condition() {
            Some(JobConditionKind::Failed) => {
                warn!(request = %request.identity(), "delegated provisioning job failed");
                request.status.stage = LifecycleStage::Failed;
                request.status.message = Some("delegated provisioning job failed".to_owned());
                self.settle(&request).await
            }
            Some(JobConditionKind::Complete) => {
                info!(request = %request.identity(), "delegated provisioning job completed");
                request.status.stage = LifecycleStage::Ready;
                request.status.message = None;
                self.settle(&request).await
            }
            None => Ok(Directive::RequeueAfter(self.job_poll_interval)),
        }
    }

    async fn settle(&self, request: &ProvisioningRequest) -> Result<Directive> {
        match self.store.update_status(request).await {
            Ok(()) => Ok(Directive::Done),
            Err(err) if err.is_conflict() => Ok(Directive::RequeueNow),
            Err(err) => Err(err.into()),
        }
    }
}
