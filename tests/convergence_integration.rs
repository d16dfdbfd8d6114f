//! ---
//! cpe_section: "15-testing-qa-runbook"
//! cpe_subsection: "integration"
//! cpe_type: "source"
//! cpe_scope: "test"
//! cpe_description: "End-to-end convergence scenarios against the memory store."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use r_cpe_common::Directive;
use r_cpe_convergence::{DatabaseReconciler, ServiceReconciler};
use r_cpe_model::{
    Credential, Database, DatabaseSpec, Endpoint, ExposureMode, ManagedService, ManagedServiceSpec,
    ObjectIdentity, ObjectMeta, StorageClaim, Workload,
};
use r_cpe_store::ResourceStore;
use r_cpe_store_memory::MemoryStore;

/// Number of dependency tiers a managed service materializes: backing
/// database claim, credential, backing database workload and endpoint,
/// identity workload and endpoint, primary workload, web and gateway
/// endpoints.
const SERVICE_TIERS: usize = 9;

fn service(spec: ManagedServiceSpec) -> ManagedService {
    ManagedService::new(ObjectMeta::named("alpha", "ns1"), spec)
}

#[tokio::test]
async fn service_converges_in_one_pass_per_tier() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&service(ManagedServiceSpec::default()))
        .await
        .unwrap();
    let id = ObjectIdentity::new("alpha", "ns1");
    let reconciler = ServiceReconciler::new(store.clone());

    for pass in 0..SERVICE_TIERS {
        let directive = reconciler.reconcile(&id).await.unwrap();
        assert_eq!(
            directive,
            Directive::RequeueNow,
            "pass {} should create one child and requeue",
            pass
        );
    }
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);

    // One write per tier plus the service object itself.
    assert_eq!(store.len(), SERVICE_TIERS + 1);

    assert!(store.contains::<StorageClaim>(&ObjectIdentity::new("alpha-auth-db", "ns1")));
    assert!(store.contains::<Credential>(&id));
    for name in ["alpha-auth-db", "alpha-auth", "alpha"] {
        assert!(store.contains::<Workload>(&ObjectIdentity::new(name, "ns1")));
    }
    for name in ["alpha-auth-db", "alpha-auth", "alpha-web", "alpha-gateway"] {
        assert!(store.contains::<Endpoint>(&ObjectIdentity::new(name, "ns1")));
    }
}

#[tokio::test]
async fn redundant_passes_write_nothing() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&service(ManagedServiceSpec::default()))
        .await
        .unwrap();
    let id = ObjectIdentity::new("alpha", "ns1");
    let reconciler = ServiceReconciler::new(store.clone());

    while !reconciler.reconcile(&id).await.unwrap().is_done() {}
    let writes = store.write_count();

    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn exposure_drift_is_corrected_without_recreating() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&service(ManagedServiceSpec {
            gateway_exposure: ExposureMode::NodePort,
            ..ManagedServiceSpec::default()
        }))
        .await
        .unwrap();
    let id = ObjectIdentity::new("alpha", "ns1");
    let reconciler = ServiceReconciler::new(store.clone());
    while !reconciler.reconcile(&id).await.unwrap().is_done() {}

    // Someone flips the gateway endpoint underneath the spec.
    let gateway = ObjectIdentity::new("alpha-gateway", "ns1");
    let mut endpoint: Endpoint = store.get(&gateway).await.unwrap();
    endpoint.exposure = ExposureMode::ClusterInternal;
    store.update(&endpoint).await.unwrap();
    let version_before = {
        let endpoint: Endpoint = store.get(&gateway).await.unwrap();
        endpoint.meta.resource_version
    };

    let directive = reconciler.reconcile(&id).await.unwrap();
    assert_eq!(directive, Directive::RequeueAfter(Duration::from_secs(60)));

    let corrected: Endpoint = store.get(&gateway).await.unwrap();
    assert_eq!(corrected.exposure, ExposureMode::NodePort);
    assert_eq!(corrected.meta.resource_version, version_before + 1);
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);
}

#[tokio::test]
async fn deleting_the_service_reclaims_owned_children() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&service(ManagedServiceSpec {
            manage_storage: false,
            ..ManagedServiceSpec::default()
        }))
        .await
        .unwrap();
    let id = ObjectIdentity::new("alpha", "ns1");
    let reconciler = ServiceReconciler::new(store.clone());
    while !reconciler.reconcile(&id).await.unwrap().is_done() {}

    assert!(store.delete::<ManagedService>(&id));

    // Everything owned by the service is gone; the storage claim survives
    // because its lifecycle was not bound to the service.
    let claim = ObjectIdentity::new("alpha-auth-db", "ns1");
    assert!(store.contains::<StorageClaim>(&claim));
    assert!(!store.contains::<Credential>(&id));
    assert!(!store.contains::<Workload>(&id));
    assert!(!store.contains::<Endpoint>(&ObjectIdentity::new("alpha-web", "ns1")));
    assert_eq!(store.len(), 1);

    // A deleted service reconciles to Done without resurrecting children.
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn managed_storage_is_reclaimed_with_the_service() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&service(ManagedServiceSpec {
            manage_storage: true,
            ..ManagedServiceSpec::default()
        }))
        .await
        .unwrap();
    let id = ObjectIdentity::new("alpha", "ns1");
    let reconciler = ServiceReconciler::new(store.clone());
    while !reconciler.reconcile(&id).await.unwrap().is_done() {}

    assert!(store.delete::<ManagedService>(&id));
    assert!(store.is_empty());
}

#[tokio::test]
async fn standalone_database_converges_and_stays_stable() {
    let store = Arc::new(MemoryStore::new());
    store
        .create(&Database::new(
            ObjectMeta::named("orders-db", "ns2"),
            DatabaseSpec {
                exposure: Some(ExposureMode::LoadBalancer),
                ..DatabaseSpec::default()
            },
        ))
        .await
        .unwrap();
    let id = ObjectIdentity::new("orders-db", "ns2");
    let reconciler = DatabaseReconciler::new(store.clone());

    for _ in 0..4 {
        assert_eq!(
            reconciler.reconcile(&id).await.unwrap(),
            Directive::RequeueNow
        );
    }
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);

    let endpoint: Endpoint = store.get(&id).await.unwrap();
    assert_eq!(endpoint.exposure, ExposureMode::LoadBalancer);

    let writes = store.write_count();
    assert_eq!(reconciler.reconcile(&id).await.unwrap(), Directive::Done);
    assert_eq!(store.write_count(), writes);
}
