//! ---
//! cpe_section: "04-convergence-control"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Pure desired-state builders for child objects."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Desired-state builders.
//!
//! Every builder is a pure function from a parent spec to one fully-specified
//! child manifest: deterministic names derived from the parent identity plus
//! a role suffix, ownership linkage set at build time, credential wiring by
//! name convention. Storage sizing is a fixed policy value per child role;
//! only the storage class is overridable in-spec. Generated secret material
//! is passed in by the caller so the builders themselves stay side-effect
//! free.

use indexmap::IndexMap;
use r_cpe_model::{
    AccessMode, ContainerPort, Credential, Database, Endpoint, EndpointPort, EnvVar, ExposureMode,
    ManagedService, ObjectMeta, OwnerRef, Protocol, StorageClaim, VolumeBinding, Workload,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Image running the managed service's primary workload.
pub const SERVICE_IMAGE: &str = "rcpe/node:latest";
/// Image backing both the embedded and the standalone database workloads.
pub const DATABASE_IMAGE: &str = "postgres:14.2-alpine";
/// Image running the identity service in front of the backing database.
pub const IDENTITY_IMAGE: &str = "jboss/keycloak:13.0.1";

/// Credential key under which the generated password is stored.
pub const CREDENTIAL_KEY: &str = "password";

/// Gateway port exposed by the primary workload.
pub const GATEWAY_PORT: u16 = 4343;
/// HTTP port exposed by the primary workload and the identity service.
pub const HTTP_PORT: u16 = 8080;
/// Wire port of the database workloads.
pub const DATABASE_PORT: u16 = 5432;

const BACKING_STORAGE_SIZE: &str = "5Gi";
const STANDALONE_STORAGE_SIZE: &str = "10Gi";
const DATA_MOUNT_PATH: &str = "/var/lib/postgresql/data";
const GENERATED_PASSWORD_LEN: usize = 16;

/// Name of the backing database chain owned by a service.
pub fn backing_database_name(service: &ManagedService) -> String {
    format!("{}-auth-db", service.meta.name)
}

/// Name of the identity service workload and endpoint.
pub fn identity_name(service: &ManagedService) -> String {
    format!("{}-auth", service.meta.name)
}

/// Name of the web endpoint.
pub fn web_endpoint_name(service: &ManagedService) -> String {
    format!("{}-web", service.meta.name)
}

/// Name of the gateway endpoint.
pub fn gateway_endpoint_name(service: &ManagedService) -> String {
    format!("{}-gateway", service.meta.name)
}

/// Generate the secret value stored in a credential object. Callers pass the
/// result into the credential builders; specs only ever carry the reference.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

fn instance_labels(service: &ManagedService) -> IndexMap<String, String> {
    let mut labels = web_selector(service);
    labels.insert("gateway".to_owned(), "true".to_owned());
    labels
}

fn web_selector(service: &ManagedService) -> IndexMap<String, String> {
    let mut labels = base_labels(service);
    labels.insert("web".to_owned(), "true".to_owned());
    labels
}

fn gateway_selector(service: &ManagedService) -> IndexMap<String, String> {
    let mut labels = base_labels(service);
    labels.insert("gateway".to_owned(), "true".to_owned());
    labels
}

fn base_labels(service: &ManagedService) -> IndexMap<String, String> {
    let mut labels = IndexMap::new();
    labels.insert("app".to_owned(), "rcpe-node".to_owned());
    labels.insert("service".to_owned(), service.meta.name.clone());
    labels
}

fn named_selector(name: &str) -> IndexMap<String, String> {
    let mut labels = IndexMap::new();
    labels.insert("name".to_owned(), name.to_owned());
    labels
}

fn storage_meta(
    name: String,
    namespace: &str,
    owner: OwnerRef,
    manage_storage: bool,
) -> ObjectMeta {
    let meta = ObjectMeta::named(name, namespace);
    // Ownership binds the claim's lifecycle to the parent; data volumes are
    // left behind on parent deletion unless the spec opts in.
    if manage_storage {
        meta.owned_by(owner)
    } else {
        meta
    }
}

/// Storage claim for the service's backing database.
pub fn backing_database_claim(service: &ManagedService) -> StorageClaim {
    StorageClaim {
        meta: storage_meta(
            backing_database_name(service),
            &service.meta.namespace,
            OwnerRef::to(service),
            service.spec.manage_storage,
        ),
        storage_class: service.spec.storage_class.clone(),
        access_mode: AccessMode::ReadWriteOnce,
        size_request: BACKING_STORAGE_SIZE.to_owned(),
    }
}

/// Shared credential for the service chain. The credential's name equals the
/// parent name; every consumer references it by that convention.
pub fn service_credential(service: &ManagedService, secret: &str) -> Credential {
    credential(
        &service.meta.name,
        &service.meta.namespace,
        OwnerRef::to(service),
        secret,
    )
}

fn credential(name: &str, namespace: &str, owner: OwnerRef, secret: &str) -> Credential {
    let mut data = IndexMap::new();
    data.insert(CREDENTIAL_KEY.to_owned(), secret.to_owned());
    Credential {
        meta: ObjectMeta::named(name, namespace).owned_by(owner),
        data,
    }
}

/// Database workload backing the identity service.
pub fn backing_database_workload(service: &ManagedService) -> Workload {
    database_workload_named(
        backing_database_name(service),
        &service.meta.namespace,
        &service.meta.name,
        OwnerRef::to(service),
    )
}

fn database_workload_named(
    name: String,
    namespace: &str,
    credential_name: &str,
    owner: OwnerRef,
) -> Workload {
    Workload {
        meta: ObjectMeta::named(name.clone(), namespace).owned_by(owner),
        replicas: 1,
        image: DATABASE_IMAGE.to_owned(),
        args: Vec::new(),
        env: vec![
            EnvVar::literal("PGDATA", DATA_MOUNT_PATH),
            EnvVar::from_credential("POSTGRES_PASSWORD", credential_name, CREDENTIAL_KEY),
        ],
        ports: vec![ContainerPort {
            name: "postgres".to_owned(),
            port: DATABASE_PORT,
        }],
        volumes: vec![VolumeBinding {
            name: "data".to_owned(),
            claim: name.clone(),
            mount_path: DATA_MOUNT_PATH.to_owned(),
            read_only: false,
        }],
        selector: named_selector(&name),
    }
}

/// Cluster-internal endpoint in front of the backing database.
pub fn backing_database_endpoint(service: &ManagedService) -> Endpoint {
    database_endpoint_named(
        backing_database_name(service),
        &service.meta.namespace,
        ExposureMode::ClusterInternal,
        OwnerRef::to(service),
    )
}

fn database_endpoint_named(
    name: String,
    namespace: &str,
    exposure: ExposureMode,
    owner: OwnerRef,
) -> Endpoint {
    Endpoint {
        meta: ObjectMeta::named(name.clone(), namespace).owned_by(owner),
        exposure,
        ports: vec![EndpointPort {
            name: "postgres".to_owned(),
            port: DATABASE_PORT,
            target_port: DATABASE_PORT,
            protocol: Protocol::Tcp,
        }],
        selector: named_selector(&name),
    }
}

/// Identity service workload, wired to the backing database and the shared
/// credential.
pub fn identity_workload(service: &ManagedService) -> Workload {
    let name = identity_name(service);
    let database = backing_database_name(service);
    Workload {
        meta: ObjectMeta::named(name.clone(), &service.meta.namespace).owned_by(OwnerRef::to(service)),
        replicas: 1,
        image: IDENTITY_IMAGE.to_owned(),
        args: Vec::new(),
        env: vec![
            EnvVar::literal("DB_VENDOR", "postgres"),
            EnvVar::literal("DB_ADDR", database),
            EnvVar::literal("DB_PORT", DATABASE_PORT.to_string()),
            EnvVar::literal("DB_USER", "postgres"),
            EnvVar::literal("DB_DATABASE", "postgres"),
            EnvVar::literal("IDENTITY_ADMIN_USER", "admin"),
            EnvVar::literal("IDENTITY_CORS", "true"),
            EnvVar::literal("IDENTITY_ALWAYS_HTTPS", "false"),
            EnvVar::literal("PROXY_ADDRESS_FORWARDING", "true"),
            EnvVar::from_credential("IDENTITY_ADMIN_PASSWORD", &service.meta.name, CREDENTIAL_KEY),
            EnvVar::from_credential("DB_PASSWORD", &service.meta.name, CREDENTIAL_KEY),
        ],
        ports: vec![ContainerPort {
            name: "identity".to_owned(),
            port: HTTP_PORT,
        }],
        volumes: Vec::new(),
        selector: named_selector(&name),
    }
}

/// Endpoint in front of the identity service.
pub fn identity_endpoint(service: &ManagedService) -> Endpoint {
    let name = identity_name(service);
    Endpoint {
        meta: ObjectMeta::named(name.clone(), &service.meta.namespace).owned_by(OwnerRef::to(service)),
        exposure: ExposureMode::LoadBalancer,
        ports: vec![EndpointPort {
            name: "identity".to_owned(),
            port: HTTP_PORT,
            target_port: HTTP_PORT,
            protocol: Protocol::Tcp,
        }],
        selector: named_selector(&name),
    }
}

/// Primary application workload of the managed service.
pub fn primary_workload(service: &ManagedService) -> Workload {
    Workload {
        meta: ObjectMeta::named(&service.meta.name, &service.meta.namespace)
            .owned_by(OwnerRef::to(service)),
        replicas: 1,
        image: SERVICE_IMAGE.to_owned(),
        args: vec!["serve".to_owned(), "--with-external".to_owned()],
        env: vec![
            EnvVar::literal("R_CPE_INSTANCE_NAME", &service.meta.name),
            EnvVar::literal(
                "R_CPE_IDENTITY_URL",
                format!("{}:{}", identity_name(service), HTTP_PORT),
            ),
            EnvVar::literal("NAMESPACE", &service.meta.namespace),
            EnvVar::from_credential("R_CPE_PASSWORD", &service.meta.name, CREDENTIAL_KEY),
        ],
        ports: vec![
            ContainerPort {
                name: "gateway".to_owned(),
                port: GATEWAY_PORT,
            },
            ContainerPort {
                name: "http".to_owned(),
                port: HTTP_PORT,
            },
        ],
        volumes: Vec::new(),
        selector: instance_labels(service),
    }
}

/// Web endpoint of the managed service; exposure comes from the spec and is
/// kept in sync by the reconciler when it drifts.
pub fn web_endpoint(service: &ManagedService) -> Endpoint {
    Endpoint {
        meta: ObjectMeta::named(web_endpoint_name(service), &service.meta.namespace)
            .owned_by(OwnerRef::to(service)),
        exposure: service.spec.web_exposure,
        ports: vec![EndpointPort {
            name: "http".to_owned(),
            port: 80,
            target_port: HTTP_PORT,
            protocol: Protocol::Tcp,
        }],
        selector: web_selector(service),
    }
}

/// Gateway endpoint of the managed service.
pub fn gateway_endpoint(service: &ManagedService) -> Endpoint {
    Endpoint {
        meta: ObjectMeta::named(gateway_endpoint_name(service), &service.meta.namespace)
            .owned_by(OwnerRef::to(service)),
        exposure: service.spec.gateway_exposure,
        ports: vec![EndpointPort {
            name: "gateway".to_owned(),
            port: GATEWAY_PORT,
            target_port: GATEWAY_PORT,
            protocol: Protocol::Tcp,
        }],
        selector: gateway_selector(service),
    }
}

/// Storage claim of a standalone database.
pub fn database_claim(database: &Database) -> StorageClaim {
    StorageClaim {
        meta: storage_meta(
            database.meta.name.clone(),
            &database.meta.namespace,
            OwnerRef::to(database),
            database.spec.manage_storage,
        ),
        storage_class: database.spec.storage_class.clone(),
        access_mode: AccessMode::ReadWriteOnce,
        size_request: STANDALONE_STORAGE_SIZE.to_owned(),
    }
}

/// Credential of a standalone database, named after the database itself.
pub fn database_credential(database: &Database, secret: &str) -> Credential {
    credential(
        &database.meta.name,
        &database.meta.namespace,
        OwnerRef::to(database),
        secret,
    )
}

/// Workload of a standalone database.
pub fn database_workload(database: &Database) -> Workload {
    database_workload_named(
        database.meta.name.clone(),
        &database.meta.namespace,
        &database.meta.name,
        OwnerRef::to(database),
    )
}

/// Endpoint of a standalone database; exposure defaults to cluster-internal
/// when the spec leaves it unset.
pub fn database_endpoint(database: &Database) -> Endpoint {
    database_endpoint_named(
        database.meta.name.clone(),
        &database.meta.namespace,
        database.spec.exposure.unwrap_or_default(),
        OwnerRef::to(database),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_cpe_model::{DatabaseSpec, ManagedServiceSpec};

    fn service() -> ManagedService {
        ManagedService::new(
            ObjectMeta::named("alpha", "ns1"),
            ManagedServiceSpec {
                web_exposure: ExposureMode::LoadBalancer,
                gateway_exposure: ExposureMode::NodePort,
                storage_class: Some("fast-ssd".to_owned()),
                manage_storage: false,
            },
        )
    }

    fn database() -> Database {
        Database::new(
            ObjectMeta::named("orders-db", "ns1"),
            DatabaseSpec {
                storage_class: None,
                exposure: None,
                manage_storage: true,
            },
        )
    }

    #[test]
    fn backing_claim_follows_sizing_policy() {
        let claim = backing_database_claim(&service());
        assert_eq!(claim.meta.name, "alpha-auth-db");
        assert_eq!(claim.meta.namespace, "ns1");
        assert_eq!(claim.storage_class.as_deref(), Some("fast-ssd"));
        assert_eq!(claim.access_mode, AccessMode::ReadWriteOnce);
        assert_eq!(claim.size_request, "5Gi");
    }

    #[test]
    fn storage_ownership_tracks_manage_storage_flag() {
        let unmanaged = backing_database_claim(&service());
        assert!(unmanaged.meta.owner_references.is_empty());

        let mut managed_parent = service();
        managed_parent.spec.manage_storage = true;
        let managed = backing_database_claim(&managed_parent);
        assert!(managed.meta.is_owned_by("ManagedService", "alpha"));

        // Same policy on the standalone builder.
        let claim = database_claim(&database());
        assert!(claim.meta.is_owned_by("Database", "orders-db"));
        assert_eq!(claim.size_request, "10Gi");
    }

    #[test]
    fn credential_name_matches_parent() {
        let credential = service_credential(&service(), "s3cr3t");
        assert_eq!(credential.meta.name, "alpha");
        assert_eq!(
            credential.data.get(CREDENTIAL_KEY).map(String::as_str),
            Some("s3cr3t")
        );
        assert!(credential.meta.is_owned_by("ManagedService", "alpha"));
    }

    #[test]
    fn generated_password_is_alphanumeric() {
        let password = generate_password();
        assert_eq!(password.len(), 16);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn backing_database_mounts_its_claim() {
        let workload = backing_database_workload(&service());
        assert_eq!(workload.meta.name, "alpha-auth-db");
        assert_eq!(workload.image, DATABASE_IMAGE);
        assert_eq!(workload.replicas, 1);
        assert_eq!(workload.volumes.len(), 1);
        assert_eq!(workload.volumes[0].claim, "alpha-auth-db");
        assert_eq!(workload.volumes[0].mount_path, "/var/lib/postgresql/data");

        let password = workload
            .env
            .iter()
            .find(|var| var.name == "POSTGRES_PASSWORD")
            .expect("password env var");
        let source = password.value_from.as_ref().expect("credential source");
        assert_eq!(source.credential_key_ref.credential, "alpha");
        assert_eq!(source.credential_key_ref.key, "password");
    }

    #[test]
    fn identity_workload_wires_database_address() {
        let workload = identity_workload(&service());
        assert_eq!(workload.meta.name, "alpha-auth");
        assert_eq!(workload.image, IDENTITY_IMAGE);
        let addr = workload
            .env
            .iter()
            .find(|var| var.name == "DB_ADDR")
            .expect("db address");
        assert_eq!(addr.value.as_deref(), Some("alpha-auth-db"));
    }

    #[test]
    fn primary_workload_serves_both_ports() {
        let workload = primary_workload(&service());
        assert_eq!(workload.meta.name, "alpha");
        assert_eq!(workload.image, SERVICE_IMAGE);
        assert_eq!(workload.args, vec!["serve", "--with-external"]);
        let ports: Vec<u16> = workload.ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![4343, 8080]);
        assert!(workload.meta.is_owned_by("ManagedService", "alpha"));
    }

    #[test]
    fn web_endpoint_takes_exposure_from_spec() {
        let endpoint = web_endpoint(&service());
        assert_eq!(endpoint.meta.name, "alpha-web");
        assert_eq!(endpoint.exposure, ExposureMode::LoadBalancer);
        assert_eq!(endpoint.ports[0].port, 80);
        assert_eq!(endpoint.ports[0].target_port, 8080);
        assert_eq!(
            endpoint.selector.get("web").map(String::as_str),
            Some("true")
        );
        assert!(endpoint.selector.get("gateway").is_none());
    }

    #[test]
    fn gateway_endpoint_takes_exposure_from_spec() {
        let endpoint = gateway_endpoint(&service());
        assert_eq!(endpoint.meta.name, "alpha-gateway");
        assert_eq!(endpoint.exposure, ExposureMode::NodePort);
        assert_eq!(endpoint.ports[0].port, 4343);
        assert_eq!(
            endpoint.selector.get("gateway").map(String::as_str),
            Some("true")
        );
        assert!(endpoint.selector.get("web").is_none());
    }

    #[test]
    fn standalone_database_endpoint_defaults_to_cluster_internal() {
        let endpoint = database_endpoint(&database());
        assert_eq!(endpoint.exposure, ExposureMode::ClusterInternal);
        assert_eq!(endpoint.ports[0].port, 5432);
    }

    #[test]
    fn builders_are_deterministic() {
        let service = service();
        assert_eq!(primary_workload(&service), primary_workload(&service));
        assert_eq!(web_endpoint(&service), web_endpoint(&service));
    }
}
