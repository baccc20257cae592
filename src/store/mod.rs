//! # API Store
//!
//! The reconciler reads and writes cluster objects only through [`ObjectStore`].
//! Every mutating call carries the caller's `resourceVersion`; a stale copy is
//! rejected with [`StoreError::Conflict`] instead of overwriting newer state.
//!
//! - `kubernetes` - [`KubeStore`], backed by `kube::Api`

mod kubernetes;

pub use kubernetes::KubeStore;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object, `None` when its metadata lacks a name
    pub fn of<K: kube::Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        let name = meta.name.clone()?;
        let namespace = meta.namespace.clone().unwrap_or_else(|| "default".to_string());
        Some(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict writing {0}: object has been modified")]
    Conflict(String),
    #[error("API store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classify a kube client error for the object at `key`
    pub fn from_kube(key: &ObjectKey, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 404 => Self::NotFound(key.to_string()),
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict(key.to_string()),
            e => Self::Unavailable(e.to_string()),
        }
    }
}

/// Typed get/create/update access to one kind of namespaced object
///
/// `update` persists metadata and spec; status changes in the payload are
/// ignored by the store. `update_status` persists status only.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch the current copy, `None` when the object does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Swxfll, SwxfllSpec};

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("ns", "app").to_string(), "ns/app");
    }

    #[test]
    fn test_object_key_of_defaults_namespace() {
        let obj = Swxfll::new("app", SwxfllSpec::default());
        assert_eq!(ObjectKey::of(&obj), Some(ObjectKey::new("default", "app")));
    }

    #[test]
    fn test_object_key_of_requires_name() {
        let mut obj = Swxfll::new("app", SwxfllSpec::default());
        obj.metadata.name = None;
        assert_eq!(ObjectKey::of(&obj), None);
    }
}
