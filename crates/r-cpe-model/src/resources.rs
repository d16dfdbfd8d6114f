//! ---
//! cpe_section: "02-object-model"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Custom resources driving the convergence reconcilers."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::children::{EnvVar, ExposureMode};
use crate::meta::{Object, ObjectMeta};

/// Desired state of a managed service instance. Authored by an operator or
/// user; the reconcilers read it and never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedServiceSpec {
    /// Exposure mode of the web endpoint.
    #[serde(default)]
    pub web_exposure: ExposureMode,
    /// Exposure mode of the gateway endpoint.
    #[serde(default)]
    pub gateway_exposure: ExposureMode,
    /// Storage class for the backing database claim; provider default when
    /// absent.
    #[serde(default)]
    pub storage_class: Option<String>,
    /// Bind the backing storage claim's lifecycle to this service, so that
    /// deleting the service also reclaims the data volume.
    #[serde(default)]
    pub manage_storage: bool,
}

/// Top-level managed service resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedService {
    pub meta: ObjectMeta,
    pub spec: ManagedServiceSpec,
}

impl ManagedService {
    pub fn new(meta: ObjectMeta, spec: ManagedServiceSpec) -> Self {
        Self { meta, spec }
    }
}

impl Object for ManagedService {
    const KIND: &'static str = "ManagedService";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Desired state of a standalone backing database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    #[serde(default)]
    pub storage_class: Option<String>,
    /// Exposure of the database endpoint; cluster-internal when absent.
    #[serde(default)]
    pub exposure: Option<ExposureMode>,
    /// Bind the storage claim's lifecycle to this database resource.
    #[serde(default)]
    pub manage_storage: bool,
}

/// Standalone database resource converged independently of any service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub meta: ObjectMeta,
    pub spec: DatabaseSpec,
}

impl Database {
    pub fn new(meta: ObjectMeta, spec: DatabaseSpec) -> Self {
        Self { meta, spec }
    }
}

impl Object for Database {
    const KIND: &'static str = "Database";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Template mapping a type descriptor onto a provisioning container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerSpec {
    /// Structured type descriptor, e.g. `<Database<SQL<acme:pg:ha:14>>>`.
    pub descriptor: String,
    /// Container image executing provisioning commands.
    pub image: String,
    /// Static environment handed to every delegated job.
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

/// Named provisioning template. Immutable once its discovery labels are
/// stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provisioner {
    pub meta: ObjectMeta,
    pub spec: ProvisionerSpec,
}

impl Provisioner {
    pub fn new(meta: ObjectMeta, spec: ProvisionerSpec) -> Self {
        Self { meta, spec }
    }
}

impl Object for Provisioner {
    const KIND: &'static str = "Provisioner";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// One provisioning attempt, one-to-one with a single delegated batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequestSpec {
    /// Name of the [`Provisioner`] template in the same namespace.
    pub provisioner: String,
    /// Target resource address handed to the provisioning command.
    pub resource_address: String,
    /// Human-readable resource name handed to the provisioning command.
    pub resource_name: String,
    /// Trailing initialization arguments appended to the command line.
    #[serde(default)]
    pub init_args: Vec<String>,
}

/// Observed lifecycle of a provisioning request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequestStatus {
    #[serde(default)]
    pub stage: LifecycleStage,
    /// Operator-facing note, e.g. which dependency the request waits on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Provisioning request resource tracked by the lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub meta: ObjectMeta,
    pub spec: ProvisioningRequestSpec,
    #[serde(default)]
    pub status: ProvisioningRequestStatus,
}

impl ProvisioningRequest {
    pub fn new(meta: ObjectMeta, spec: ProvisioningRequestSpec) -> Self {
        Self {
            meta,
            spec,
            status: ProvisioningRequestStatus::default(),
        }
    }
}

impl Object for ProvisioningRequest {
    const KIND: &'static str = "ProvisioningRequest";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Lifecycle stage of a provisioning request.
///
/// Transitions are monotonic forward only: `Unset -> Creating` happens exactly
/// once and triggers job creation, `Creating -> {Ready, Failed}` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStage {
    #[default]
    Unset,
    Creating,
    Ready,
    Failed,
}

impl LifecycleStage {
    /// True once the stage can no longer advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStage::Ready | LifecycleStage::Failed)
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleStage::Unset => "Unset",
            LifecycleStage::Creating => "Creating",
            LifecycleStage::Ready => "Ready",
            LifecycleStage::Failed => "Failed",
        };
        f.write_str(label)
    }
}
