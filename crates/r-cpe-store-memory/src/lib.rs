//! ---
//! cpe_section: "03-resource-store"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "In-memory store backend with optimistic concurrency."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! In-memory [`ResourceStore`] backend.
//!
//! Objects are held as JSON documents keyed by kind, namespace, and name,
//! with a per-object revision counter backing optimistic conflict detection.
//! Status writes merge only the `status` field and desired-state writes
//! preserve whatever status is already recorded, giving the two write paths
//! the isolation the reconcilers rely on. Deleting a parent cascades to every
//! object referencing it through owner references, which is the contract the
//! builders assume when they set ownership at creation time.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use r_cpe_model::{Object, ObjectIdentity};
use r_cpe_store::{ResourceStore, StoreError, StoreResult};
use serde_json::Value;
use tracing::debug;

type StoreKey = (String, String, String);

#[derive(Debug)]
struct StoredObject {
    doc: Value,
    version: u64,
}

#[derive(Debug, Default)]
struct MemoryInner {
    objects: HashMap<StoreKey, StoredObject>,
    writes: u64,
}

/// In-memory store used by the test suites and as a development backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of mutating operations accepted so far. Idempotence
    /// suites assert this stays flat across redundant passes.
    pub fn write_count(&self) -> u64 {
        self.inner.read().writes
    }

    /// Number of objects currently stored, across all kinds and namespaces.
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when an object of the given type exists at the identity.
    pub fn contains<T: Object>(&self, id: &ObjectIdentity) -> bool {
        self.inner
            .read()
            .objects
            .contains_key(&key_for::<T>(id))
    }

    /// Remove an object and, transitively, everything it owns.
    ///
    /// Returns whether the named object itself existed. Cascade deletion is
    /// the store-side half of the ownership contract; reconcilers never run
    /// deletion sweeps of their own.
    pub fn delete<T: Object>(&self, id: &ObjectIdentity) -> bool {
        let mut inner = self.inner.write();
        let root = (T::KIND.to_owned(), id.namespace.clone(), id.name.clone());
        if inner.objects.remove(&root).is_none() {
            return false;
        }
        let mut queue = vec![root];
        while let Some((kind, namespace, name)) = queue.pop() {
            debug!(kind = %kind, namespace = %namespace, name = %name, "object removed");
            let owned: Vec<StoreKey> = inner
                .objects
                .iter()
                .filter(|(candidate, stored)| {
                    candidate.1 == namespace && doc_owned_by(&stored.doc, &kind, &name)
                })
                .map(|(candidate, _)| candidate.clone())
                .collect();
            for key in owned {
                if inner.objects.remove(&key).is_some() {
                    queue.push(key);
                }
            }
        }
        true
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<T: Object>(&self, id: &ObjectIdentity) -> StoreResult<T> {
        let inner = self.inner.read();
        let stored = inner
            .objects
            .get(&key_for::<T>(id))
            .ok_or_else(|| StoreError::not_found::<T>(id))?;
        serde_json::from_value(stored.doc.clone())
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn create<T: Object>(&self, object: &T) -> StoreResult<()> {
        let id = object.identity();
        let mut inner = self.inner.write();
        let key = key_for::<T>(&id);
        if inner.objects.contains_key(&key) {
            return Err(StoreError::already_exists::<T>(&id));
        }
        let doc = encode(object, 1)?;
        inner.objects.insert(key, StoredObject { doc, version: 1 });
        inner.writes += 1;
        Ok(())
    }

    async fn update<T: Object>(&self, object: &T) -> StoreResult<()> {
        let id = object.identity();
        let mut guard = self.inner.write();
        let MemoryInner { objects, writes } = &mut *guard;
        let stored = match objects.get_mut(&key_for::<T>(&id)) {
            Some(stored) => stored,
            None => return Err(StoreError::not_found::<T>(&id)),
        };
        if object.meta().resource_version != stored.version {
            return Err(StoreError::conflict::<T>(&id));
        }
        let next = stored.version + 1;
        let mut doc = encode(object, next)?;
        // The desired-state path must not clobber status written through the
        // status subresource.
        if let Some(previous_status) = stored.doc.get("status").cloned() {
            if let Some(slot) = doc.get_mut("status") {
                *slot = previous_status;
            }
        }
        stored.doc = doc;
        stored.version = next;
        *writes += 1;
        Ok(())
    }

    async fn update_status<T: Object>(&self, object: &T) -> StoreResult<()> {
        let id = object.identity();
        let mut guard = self.inner.write();
        let MemoryInner { objects, writes } = &mut *guard;
        let stored = match objects.get_mut(&key_for::<T>(&id)) {
            Some(stored) => stored,
            None => return Err(StoreError::not_found::<T>(&id)),
        };
        if object.meta().resource_version != stored.version {
            return Err(StoreError::conflict::<T>(&id));
        }
        let next = stored.version + 1;
        let incoming = encode(object, next)?;
        if let Some(status) = incoming.get("status").cloned() {
            if let Some(doc) = stored.doc.as_object_mut() {
                doc.insert("status".to_owned(), status);
            }
        }
        if let Some(slot) = stored.doc.pointer_mut("/meta/resource_version") {
            *slot = Value::from(next);
        }
        stored.version = next;
        *writes += 1;
        Ok(())
    }
}

fn key_for<T: Object>(id: &ObjectIdentity) -> StoreKey {
    (T::KIND.to_owned(), id.namespace.clone(), id.name.clone())
}

fn encode<T: Object>(object: &T, version: u64) -> StoreResult<Value> {
    let mut doc =
        serde_json::to_value(object).map_err(|err| StoreError::Backend(err.to_string()))?;
    if let Some(slot) = doc.pointer_mut("/meta/resource_version") {
        *slot = Value::from(version);
    }
    Ok(doc)
}

fn doc_owned_by(doc: &Value, kind: &str, name: &str) -> bool {
    doc.pointer("/meta/owner_references")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter().any(|r| {
                r.get("kind").and_then(Value::as_str) == Some(kind)
                    && r.get("name").and_then(Value::as_str) == Some(name)
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_cpe_model::{
        Credential, LifecycleStage, ManagedService, ManagedServiceSpec, ObjectMeta, OwnerRef,
        ProvisioningRequest, ProvisioningRequestSpec, Workload,
    };

    fn request(name: &str) -> ProvisioningRequest {
        ProvisioningRequest::new(
            ObjectMeta::named(name, "ns1"),
            ProvisioningRequestSpec {
                provisioner: "pg-provisioner".into(),
                resource_address: "space:db".into(),
                resource_name: "db".into(),
                init_args: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryStore::new();
        let service = ManagedService::new(
            ObjectMeta::named("alpha", "ns1"),
            ManagedServiceSpec::default(),
        );
        store.create(&service).await.unwrap();

        let fetched: ManagedService = store
            .get(&ObjectIdentity::new("alpha", "ns1"))
            .await
            .unwrap();
        assert_eq!(fetched.meta.resource_version, 1);
        assert_eq!(fetched.spec, service.spec);
    }

    #[tokio::test]
    async fn duplicate_create_reports_already_exists() {
        let store = MemoryStore::new();
        let service = ManagedService::new(
            ObjectMeta::named("alpha", "ns1"),
            ManagedServiceSpec::default(),
        );
        store.create(&service).await.unwrap();
        let err = store.create(&service).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn missing_object_reports_not_found() {
        let store = MemoryStore::new();
        let err = store
            .get::<Workload>(&ObjectIdentity::new("ghost", "ns1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        store.create(&request("req")).await.unwrap();

        let id = ObjectIdentity::new("req", "ns1");
        let stale: ProvisioningRequest = store.get(&id).await.unwrap();
        let mut fresh: ProvisioningRequest = store.get(&id).await.unwrap();
        fresh.spec.resource_name = "renamed".into();
        store.update(&fresh).await.unwrap();

        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn spec_update_preserves_status() {
        let store = MemoryStore::new();
        store.create(&request("req")).await.unwrap();
        let id = ObjectIdentity::new("req", "ns1");

        let mut staged: ProvisioningRequest = store.get(&id).await.unwrap();
        staged.status.stage = LifecycleStage::Creating;
        store.update_status(&staged).await.unwrap();

        let mut edited: ProvisioningRequest = store.get(&id).await.unwrap();
        edited.spec.resource_name = "renamed".into();
        edited.status.stage = LifecycleStage::Unset;
        store.update(&edited).await.unwrap();

        let current: ProvisioningRequest = store.get(&id).await.unwrap();
        assert_eq!(current.spec.resource_name, "renamed");
        assert_eq!(current.status.stage, LifecycleStage::Creating);
    }

    #[tokio::test]
    async fn status_update_leaves_spec_untouched() {
        let store = MemoryStore::new();
        store.create(&request("req")).await.unwrap();
        let id = ObjectIdentity::new("req", "ns1");

        let mut staged: ProvisioningRequest = store.get(&id).await.unwrap();
        staged.spec.resource_name = "smuggled".into();
        staged.status.stage = LifecycleStage::Creating;
        store.update_status(&staged).await.unwrap();

        let current: ProvisioningRequest = store.get(&id).await.unwrap();
        assert_eq!(current.spec.resource_name, "db");
        assert_eq!(current.status.stage, LifecycleStage::Creating);
        assert_eq!(current.meta.resource_version, 2);
    }

    #[tokio::test]
    async fn deleting_a_parent_cascades_through_owner_references() {
        let store = MemoryStore::new();
        let service = ManagedService::new(
            ObjectMeta::named("alpha", "ns1"),
            ManagedServiceSpec::default(),
        );
        store.create(&service).await.unwrap();

        let credential = Credential {
            meta: ObjectMeta::named("alpha", "ns1").owned_by(OwnerRef::to(&service)),
            data: Default::default(),
        };
        store.create(&credential).await.unwrap();

        let unrelated = Credential {
            meta: ObjectMeta::named("other", "ns1"),
            data: Default::default(),
        };
        store.create(&unrelated).await.unwrap();

        assert!(store.delete::<ManagedService>(&ObjectIdentity::new("alpha", "ns1")));
        assert!(!store.contains::<Credential>(&ObjectIdentity::new("alpha", "ns1")));
        assert!(store.contains::<Credential>(&ObjectIdentity::new("other", "ns1")));
    }
}
