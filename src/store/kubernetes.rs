//! # Kubernetes-backed store
//!
//! [`ObjectStore`] over `kube::Api`. Writes are full replaces (PUT), so the
//! API server checks `metadata.resourceVersion` and answers 409 on staleness.

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Store for one resource kind; the kind is fixed by the type parameter
pub struct KubeStore<K> {
    client: Client,
    timeout: Duration,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Run an API call under the configured timeout
    async fn bounded<T, F>(&self, key: &ObjectKey, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| StoreError::from_kube(key, e)),
            Err(_elapsed) => Err(StoreError::Unavailable(format!(
                "request for {} {} timed out after {}s",
                K::kind(&()),
                key,
                self.timeout.as_secs()
            ))),
        }
    }
}

fn key_of<K: Resource<DynamicType = ()>>(obj: &K) -> Result<ObjectKey, StoreError> {
    ObjectKey::of(obj).ok_or_else(|| {
        StoreError::Unavailable(format!("{} object has no name", K::kind(&())))
    })
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api = self.api(&key.namespace);
        self.bounded(key, api.get_opt(&key.name)).await
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        debug!("Creating {} {}", K::kind(&()), key);
        let api = self.api(&key.namespace);
        self.bounded(&key, api.create(&PostParams::default(), obj))
            .await
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        debug!("Updating {} {}", K::kind(&()), key);
        let api = self.api(&key.namespace);
        self.bounded(&key, api.replace(&key.name, &PostParams::default(), obj))
            .await
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_of(obj)?;
        debug!("Updating status of {} {}", K::kind(&()), key);
        let data = serde_json::to_vec(obj)
            .map_err(|e| StoreError::Unavailable(format!("failed to encode {key}: {e}")))?;
        let api = self.api(&key.namespace);
        self.bounded(
            &key,
            api.replace_status(&key.name, &PostParams::default(), data),
        )
        .await
    }
}
