//! # Reconciler Types
//!
//! The reconciler context, its error taxonomy and the outcome handed back to the scheduler.

use crate::config::{ConfigSource, ControllerConfig, EnvConfigSource};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::{EventSink, KubeEventSink};
use crate::controller::reconciler::desired::ConfigurationError;
use crate::controller::reconciler::finalizer::CleanupHook;
use crate::crd::Swxfll;
use crate::store::{KubeStore, ObjectKey, ObjectStore, StoreError};
use k8s_openapi::api::apps::v1::Deployment;
use kube::Client;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The object vanished; the reconcile ends quietly
    #[error("{0} not found")]
    NotFound(ObjectKey),
    #[error("version conflict on {0}; will re-fetch and retry")]
    VersionConflict(ObjectKey),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("API store unavailable for {key}: {message}")]
    StoreUnavailable { key: ObjectKey, message: String },
    #[error("finalizer cleanup for {key} did not complete: {source}")]
    FinalizerIncomplete {
        key: ObjectKey,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ReconcilerError {
    /// Classify a store failure for the object at `key`
    pub fn from_store(key: &ObjectKey, error: StoreError) -> Self {
        match error {
            StoreError::NotFound(_) => Self::NotFound(key.clone()),
            StoreError::Conflict(_) => Self::VersionConflict(key.clone()),
            StoreError::Unavailable(message) => Self::StoreUnavailable {
                key: key.clone(),
                message,
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict(_))
    }

    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::VersionConflict(_) => "conflict",
            Self::Configuration(_) => "configuration",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::FinalizerIncomplete { .. } => "finalizer_incomplete",
            Self::InvalidObject(_) => "invalid_object",
        }
    }
}

/// What the scheduler should do with the identity after a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change notification
    Settled,
    /// Re-invoke after the delay to verify progress
    RequeueAfter(Duration),
}

impl From<ReconcileOutcome> for Action {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Settled => Action::await_change(),
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Reconciler context shared by every invocation
///
/// Holds only collaborators and read-only configuration; all object state
/// lives in the API store. `backoff_states` belongs to the error policy.
pub struct Reconciler {
    pub parents: Arc<dyn ObjectStore<Swxfll>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub events: Arc<dyn EventSink>,
    pub config_source: Arc<dyn ConfigSource>,
    pub cleanup_hooks: Vec<Arc<dyn CleanupHook>>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("cleanup_hooks", &self.cleanup_hooks.len())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        parents: Arc<dyn ObjectStore<Swxfll>>,
        deployments: Arc<dyn ObjectStore<Deployment>>,
        events: Arc<dyn EventSink>,
        config_source: Arc<dyn ConfigSource>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            parents,
            deployments,
            events,
            config_source,
            cleanup_hooks: Vec::new(),
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Reconciler wired to a live cluster, resolving the image from the process environment
    pub fn for_cluster(client: Client, config: ControllerConfig) -> Self {
        let timeout = config.api_timeout;
        Self::new(
            Arc::new(KubeStore::<Swxfll>::new(client.clone(), timeout)),
            Arc::new(KubeStore::<Deployment>::new(client.clone(), timeout)),
            Arc::new(KubeEventSink::new(client, crate::constants::CONTROLLER_NAME)),
            Arc::new(EnvConfigSource),
            config,
        )
    }

    /// Register an additional step to run before the finalizer is removed
    #[must_use]
    pub fn with_cleanup_hook(mut self, hook: Arc<dyn CleanupHook>) -> Self {
        self.cleanup_hooks.push(hook);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let key = ObjectKey::new("ns", "a");
        assert!(matches!(
            ReconcilerError::from_store(&key, StoreError::NotFound("ns/a".into())),
            ReconcilerError::NotFound(_)
        ));
        assert!(ReconcilerError::from_store(&key, StoreError::Conflict("ns/a".into())).is_conflict());
        let unavailable = ReconcilerError::from_store(&key, StoreError::Unavailable("timeout".into()));
        assert_eq!(unavailable.reason(), "store_unavailable");
        assert!(unavailable.to_string().contains("timeout"));
    }

    #[test]
    fn test_outcome_into_action() {
        assert_eq!(Action::from(ReconcileOutcome::Settled), Action::await_change());
        assert_eq!(
            Action::from(ReconcileOutcome::RequeueAfter(Duration::from_secs(5))),
            Action::requeue(Duration::from_secs(5))
        );
    }
}
