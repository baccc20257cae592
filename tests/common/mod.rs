//! # Test Support
//!
//! In-memory API store and event sink for driving the reconciler without a cluster.
//!
//! The store behaves like the API server where it matters here:
//! - writes carrying a stale `resourceVersion` are rejected with a conflict
//! - `update` ignores status and `update_status` ignores everything else
//! - an object marked for deletion disappears once its finalizers are empty

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Resource;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use swxfll_operator::config::{ControllerConfig, StaticConfigSource};
use swxfll_operator::controller::events::{EventSeverity, EventSink};
use swxfll_operator::controller::reconciler::{CleanupHook, Reconciler};
use swxfll_operator::store::{ObjectKey, ObjectStore, StoreError};
use swxfll_operator::{Swxfll, SwxfllSpec};

pub const NAMESPACE: &str = "default";
pub const IMAGE: &str = "docker.io/swxfll/swxfll:1.4.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Update,
    UpdateStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Conflict,
    Unavailable,
}

impl Failure {
    fn error(self, key: &ObjectKey) -> StoreError {
        match self {
            Failure::Conflict => StoreError::Conflict(key.to_string()),
            Failure::Unavailable => StoreError::Unavailable("connection refused".to_string()),
        }
    }
}

/// One successful write, with the stored object as it was right after it
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub kind: String,
    pub op: Op,
    pub key: ObjectKey,
    pub object: serde_json::Value,
}

pub type WriteLog = Arc<Mutex<Vec<WriteRecord>>>;

/// How a kind splits into the main resource and its status subresource
pub trait Subresources: Clone {
    /// Copy spec, returning whether it changed
    fn copy_spec(stored: &mut Self, incoming: &Self) -> bool;
    fn copy_status(stored: &mut Self, incoming: &Self);
}

impl Subresources for Swxfll {
    fn copy_spec(stored: &mut Self, incoming: &Self) -> bool {
        let changed = stored.spec != incoming.spec;
        stored.spec = incoming.spec.clone();
        changed
    }

    fn copy_status(stored: &mut Self, incoming: &Self) {
        stored.status = incoming.status.clone();
    }
}

impl Subresources for Deployment {
    fn copy_spec(stored: &mut Self, incoming: &Self) -> bool {
        let changed = stored.spec != incoming.spec;
        stored.spec = incoming.spec.clone();
        changed
    }

    fn copy_status(stored: &mut Self, incoming: &Self) {
        stored.status = incoming.status.clone();
    }
}

pub struct MemoryStore<K> {
    objects: Mutex<HashMap<ObjectKey, K>>,
    failures: Mutex<Vec<(Option<Op>, Failure)>>,
    revision: AtomicU64,
    gets: AtomicU64,
    log: WriteLog,
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Subresources + Serialize + Send + Sync + 'static,
{
    pub fn new(log: WriteLog) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            revision: AtomicU64::new(1),
            gets: AtomicU64::new(0),
            log,
        }
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Place an object directly, bypassing all write semantics
    pub fn insert(&self, mut obj: K) -> K {
        let key = ObjectKey::of(&obj).expect("object needs a name");
        let meta = obj.meta_mut();
        meta.resource_version = Some(self.next_revision());
        meta.uid.get_or_insert_with(|| format!("uid-{}", key.name));
        meta.generation.get_or_insert(1);
        self.objects.lock().unwrap().insert(key, obj.clone());
        obj
    }

    /// Mutate the stored object as another client would, bumping its version
    pub fn edit(&self, key: &ObjectKey, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects.get_mut(key).expect("object to edit must exist");
        f(obj);
        obj.meta_mut().resource_version = Some(self.next_revision());
    }

    pub fn stored(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Fail the next write of `op` (any read or write when `None` is given)
    pub fn fail_next(&self, op: Option<Op>, failure: Failure) {
        self.failures.lock().unwrap().push((op, failure));
    }

    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    fn take_failure(&self, op: Option<Op>, key: &ObjectKey) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().unwrap();
        let position = failures
            .iter()
            .position(|(wanted, _)| wanted.is_none() || *wanted == op);
        match position {
            Some(i) => Err(failures.remove(i).1.error(key)),
            None => Ok(()),
        }
    }

    fn record(&self, op: Op, key: &ObjectKey, obj: &K) {
        self.log.lock().unwrap().push(WriteRecord {
            kind: K::kind(&()).to_string(),
            op,
            key: key.clone(),
            object: serde_json::to_value(obj).unwrap(),
        });
    }

    fn write(&self, op: Op, incoming: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(incoming).expect("written object needs a name");
        self.take_failure(Some(op), &key)?;

        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.meta().resource_version != incoming.meta().resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }

        match op {
            Op::UpdateStatus => K::copy_status(stored, incoming),
            _ => {
                let source = incoming.meta().clone();
                let meta = stored.meta_mut();
                meta.labels = source.labels;
                meta.annotations = source.annotations;
                meta.finalizers = source.finalizers;
                meta.owner_references = source.owner_references;
                if K::copy_spec(stored, incoming) {
                    let meta = stored.meta_mut();
                    meta.generation = Some(meta.generation.unwrap_or(0) + 1);
                }
            }
        }
        stored.meta_mut().resource_version = Some(self.next_revision());
        let result = stored.clone();

        let released = stored.meta().deletion_timestamp.is_some()
            && stored.meta().finalizers.as_ref().is_none_or(Vec::is_empty);
        if released {
            objects.remove(&key);
        }
        drop(objects);

        self.record(op, &key, &result);
        Ok(result)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Subresources + Serialize + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.take_failure(None, key)?;
        Ok(self.stored(key))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj).expect("created object needs a name");
        self.take_failure(Some(Op::Create), &key)?;
        if self.objects.lock().unwrap().contains_key(&key) {
            return Err(StoreError::Conflict(key.to_string()));
        }
        let created = self.insert(obj.clone());
        self.record(Op::Create, &key, &created);
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        self.write(Op::Update, obj)
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        self.write(Op::UpdateStatus, obj)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub severity: EventSeverity,
    pub reason: String,
    pub message: String,
    pub object: Option<String>,
}

#[derive(Default)]
pub struct RecordingEventSink {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl EventSink for RecordingEventSink {
    fn emit(&self, reference: &ObjectReference, severity: EventSeverity, reason: &str, message: String) {
        self.events.lock().unwrap().push(RecordedEvent {
            severity,
            reason: reason.to_string(),
            message,
            object: reference.name.clone(),
        });
    }
}

/// Cleanup hook that always fails
pub struct FailingHook;

#[async_trait]
impl CleanupHook for FailingHook {
    fn name(&self) -> &str {
        "failing-backup"
    }

    async fn cleanup(&self, _obj: &Swxfll) -> anyhow::Result<()> {
        anyhow::bail!("backup target unreachable")
    }
}

/// Cleanup hook that counts its invocations
#[derive(Default)]
pub struct CountingHook {
    pub calls: AtomicU64,
}

#[async_trait]
impl CleanupHook for CountingHook {
    fn name(&self) -> &str {
        "counting"
    }

    async fn cleanup(&self, _obj: &Swxfll) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub parents: Arc<MemoryStore<Swxfll>>,
    pub deployments: Arc<MemoryStore<Deployment>>,
    pub events: Arc<RecordingEventSink>,
    pub log: WriteLog,
}

impl Harness {
    pub fn new() -> Self {
        let log: WriteLog = Arc::default();
        Self {
            parents: Arc::new(MemoryStore::new(Arc::clone(&log))),
            deployments: Arc::new(MemoryStore::new(Arc::clone(&log))),
            events: Arc::default(),
            log,
        }
    }

    pub fn reconciler_with_source(&self, source: StaticConfigSource) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.parents) as Arc<dyn ObjectStore<Swxfll>>,
            Arc::clone(&self.deployments) as Arc<dyn ObjectStore<Deployment>>,
            Arc::clone(&self.events) as Arc<dyn EventSink>,
            Arc::new(source),
            ControllerConfig::default(),
        )
    }

    /// Reconciler with `SWXFLL_IMAGE` set to [`IMAGE`]
    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with_source(StaticConfigSource::new().with("SWXFLL_IMAGE", IMAGE))
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn add(&self, name: &str, size: i32, container_port: i32) -> (ObjectKey, Swxfll) {
        let mut obj = Swxfll::new(name, SwxfllSpec { size, container_port });
        obj.metadata.namespace = Some(NAMESPACE.to_string());
        (ObjectKey::new(NAMESPACE, name), self.parents.insert(obj))
    }

    /// Request deletion the way the API server does: set the timestamp, keep the object
    pub fn request_deletion(&self, key: &ObjectKey) {
        self.parents.edit(key, |obj| {
            obj.metadata.deletion_timestamp = Some(deletion_time());
        });
    }
}

pub fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2024-05-01T12:00:00Z")).unwrap()
}

/// Condition `type` from a recorded Swxfll snapshot
pub fn condition_in(object: &serde_json::Value, r#type: &str) -> Option<serde_json::Value> {
    object["status"]["conditions"]
        .as_array()?
        .iter()
        .find(|c| c["type"] == r#type)
        .cloned()
}
