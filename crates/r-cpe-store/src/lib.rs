//! ---
//! cpe_section: "03-resource-store"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Injected store capability consumed by the reconcilers."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
//! Capability trait through which reconcilers read and write cluster objects.
//!
//! The store is always injected and held by reference, never reached through
//! ambient global state. Consistency relies on optimistic conflict detection
//! at the store plus the reconcilers' one-mutation-per-pass rule; the core
//! takes no locks of its own.

use async_trait::async_trait;
use r_cpe_model::{Object, ObjectIdentity};
use thiserror::Error;

/// Outcome taxonomy for store round trips.
///
/// `NotFound` and `Conflict` are expected operating conditions: the former
/// drives child creation, the latter an immediate re-read-and-retry. Only
/// `Backend` represents an actual failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("{kind} {id} was modified concurrently")]
    Conflict { kind: &'static str, id: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// `NotFound` for the given object type and identity.
    pub fn not_found<T: Object>(id: &ObjectIdentity) -> Self {
        StoreError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    /// `AlreadyExists` for the given object type and identity.
    pub fn already_exists<T: Object>(id: &ObjectIdentity) -> Self {
        StoreError::AlreadyExists {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    /// `Conflict` for the given object type and identity.
    pub fn conflict<T: Object>(id: &ObjectIdentity) -> Self {
        StoreError::Conflict {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Shared result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Typed key-value store of named, namespaced objects with optimistic
/// conflict semantics and a status subresource write path.
///
/// Implementations guarantee that a parent's deletion cascades to every
/// object referencing it through owner references; the core only establishes
/// that linkage at creation time.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object by identity. Absence is reported as
    /// [`StoreError::NotFound`], which callers treat as a normal creation
    /// trigger rather than a failure.
    async fn get<T: Object>(&self, id: &ObjectIdentity) -> StoreResult<T>;

    /// Persist a new object. [`StoreError::AlreadyExists`] means a concurrent
    /// creator won the race; callers treat it as success-equivalent and
    /// requeue to re-read.
    async fn create<T: Object>(&self, object: &T) -> StoreResult<()>;

    /// Replace an object's desired state. [`StoreError::Conflict`] signals a
    /// stale read; callers requeue to re-read and retry. Status carried on
    /// the object is ignored by this path.
    async fn update<T: Object>(&self, object: &T) -> StoreResult<()>;

    /// Replace only an object's status, leaving the desired state untouched
    /// so status advancement never races a concurrent spec edit.
    async fn update_status<T: Object>(&self, object: &T) -> StoreResult<()>;
}
