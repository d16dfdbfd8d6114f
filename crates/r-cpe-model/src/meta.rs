//! ---
//! cpe_section: "02-object-model"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Object metadata, identities, and ownership linkage."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Namespaced identity of a stored object; the key of a convergence pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub name: String,
    pub namespace: String,
}

impl ObjectIdentity {
    /// Construct an identity from name and namespace.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Derive a sibling identity in the same namespace, used for children
    /// whose names are the parent name plus a role suffix.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: self.namespace.clone(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cascade-delete linkage from a child object back to its parent.
///
/// The store contract is that deleting a parent removes every object in the
/// same namespace referencing it; the core only establishes the relation at
/// creation time and never repairs it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    /// Reference the given object as owner.
    pub fn to<T: Object>(owner: &T) -> Self {
        Self {
            kind: T::KIND.to_owned(),
            name: owner.meta().name.clone(),
        }
    }
}

/// Common metadata carried by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerRef>,
    /// Revision counter backing the store's optimistic conflict detection.
    /// Zero means the object has never been persisted.
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// Metadata for a freshly built object that has not been persisted yet.
    pub fn named(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// The identity of the object carrying this metadata.
    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity::new(self.name.clone(), self.namespace.clone())
    }

    /// Attach an owner reference; consumed by the builders at creation time.
    pub fn owned_by(mut self, owner: OwnerRef) -> Self {
        self.owner_references.push(owner);
        self
    }

    /// True when this object references the given parent.
    pub fn is_owned_by(&self, kind: &str, name: &str) -> bool {
        self.owner_references
            .iter()
            .any(|r| r.kind == kind && r.name == name)
    }
}

/// A typed object the resource store can persist.
pub trait Object: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable kind discriminator used as part of the store key.
    const KIND: &'static str;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// The namespaced identity of this object.
    fn identity(&self) -> ObjectIdentity {
        self.meta().identity()
    }
}
