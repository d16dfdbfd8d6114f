//! ---
//! cpe_section: "02-object-model"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Child object shapes handed to the resource store."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::meta::{Object, ObjectMeta};

/// How an endpoint is reachable from outside the workload network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureMode {
    #[default]
    ClusterInternal,
    NodePort,
    LoadBalancer,
}

/// Volume access mode requested by a storage claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    #[default]
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
}

/// Claim for durable storage backing a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageClaim {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub access_mode: AccessMode,
    pub size_request: String,
}

impl Object for StorageClaim {
    const KIND: &'static str = "StorageClaim";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Generated secret material referenced by workloads by name, never by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: IndexMap<String, String>,
}

impl Object for Credential {
    const KIND: &'static str = "Credential";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Reference to a single key inside a [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialKeyRef {
    pub credential: String,
    pub key: String,
}

/// Indirect environment variable source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarSource {
    pub credential_key_ref: CredentialKeyRef,
}

/// Environment variable carrying either a literal value or a credential
/// reference. Secret values never appear inline in a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Literal-valued environment variable.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// Environment variable resolved from a credential key at launch time.
    pub fn from_credential(
        name: impl Into<String>,
        credential: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                credential_key_ref: CredentialKeyRef {
                    credential: credential.into(),
                    key: key.into(),
                },
            }),
        }
    }
}

/// Named container port on a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    pub name: String,
    pub port: u16,
}

/// Binding of a storage claim into a workload's filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub name: String,
    pub claim: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Long-running application workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub meta: ObjectMeta,
    pub replicas: u32,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub volumes: Vec<VolumeBinding>,
    /// Labels stamped onto the workload's instances; endpoints select on them.
    #[serde(default)]
    pub selector: IndexMap<String, String>,
}

impl Object for Workload {
    const KIND: &'static str = "Workload";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Transport protocol of an endpoint port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Port mapping published by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPort {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

/// Network endpoint routing traffic to workload instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub exposure: ExposureMode,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
    #[serde(default)]
    pub selector: IndexMap<String, String>,
}

impl Object for Endpoint {
    const KIND: &'static str = "Endpoint";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Restart behaviour of a delegated batch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    Never,
    OnFailure,
}

/// Terminal condition kinds a batch job can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobConditionKind {
    Complete,
    Failed,
}

/// Condition recorded on a batch job by the job runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCondition {
    pub kind: JobConditionKind,
    pub recorded_at: DateTime<Utc>,
}

impl JobCondition {
    /// Condition stamped with the current wall clock.
    pub fn new(kind: JobConditionKind) -> Self {
        Self {
            kind,
            recorded_at: Utc::now(),
        }
    }
}

/// Observed status of a batch job. Written by the job runner, read here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub conditions: Vec<JobCondition>,
}

/// One-shot delegated unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub meta: ObjectMeta,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub backoff_limit: u32,
    #[serde(default)]
    pub status: JobStatus,
}

impl BatchJob {
    /// First terminal condition recorded on the job, if any.
    pub fn terminal_condition(&self) -> Option<JobConditionKind> {
        for condition in &self.status.conditions {
            match condition.kind {
                JobConditionKind::Failed => return Some(JobConditionKind::Failed),
                JobConditionKind::Complete => return Some(JobConditionKind::Complete),
            }
        }
        None
    }
}

impl Object for BatchJob {
    const KIND: &'static str = "BatchJob";

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_env_var_carries_no_value() {
        let var = EnvVar::from_credential("APP_PASSWORD", "alpha", "password");
        assert!(var.value.is_none());
        let source = var.value_from.expect("credential source");
        assert_eq!(source.credential_key_ref.credential, "alpha");
        assert_eq!(source.credential_key_ref.key, "password");
    }

    #[test]
    fn terminal_condition_prefers_failed() {
        let mut job = BatchJob {
            meta: ObjectMeta::named("job", "ns1"),
            image: "runner:latest".into(),
            args: Vec::new(),
            env: Vec::new(),
            restart_policy: RestartPolicy::Never,
            backoff_limit: 0,
            status: JobStatus::default(),
        };
        assert_eq!(job.terminal_condition(), None);

        job.status
            .conditions
            .push(JobCondition::new(JobConditionKind::Failed));
        job.status
            .conditions
            .push(JobCondition::new(JobConditionKind::Complete));
        assert_eq!(job.terminal_condition(), Some(JobConditionKind::Failed));
    }

    #[test]
    fn exposure_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&ExposureMode::LoadBalancer).unwrap();
        assert_eq!(json, "\"load-balancer\"");
    }
}
