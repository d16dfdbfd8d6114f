//! ---
//! cpe_section: "02-object-model"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Typed object model for stored cluster objects."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Typed object model for the R-CPE workspace: object metadata, the child
//! shapes handed to the resource store, the custom resources driving the
//! reconcilers, and the provisioner type-descriptor grammar.

pub mod children;
pub mod descriptor;
pub mod meta;
pub mod resources;

pub use children::{
    AccessMode, BatchJob, ContainerPort, Credential, CredentialKeyRef, Endpoint, EndpointPort,
    EnvVar, EnvVarSource, ExposureMode, JobCondition, JobConditionKind, JobStatus, Protocol,
    RestartPolicy, StorageClaim, VolumeBinding, Workload,
};
pub use descriptor::{DescriptorError, SpecificDescriptor, TypeDescriptor};
pub use meta::{Object, ObjectIdentity, ObjectMeta, OwnerRef};
pub use resources::{
    Database, DatabaseSpec, LifecycleStage, ManagedService, ManagedServiceSpec, Provisioner,
    ProvisionerSpec, ProvisioningRequest, ProvisioningRequestSpec, ProvisioningRequestStatus,
};
