//! # Watch Loop
//!
//! Drives reconciliation with `kube_runtime::Controller`: one queue entry per
//! Swxfll, invocations for the same resource never overlap, and owned
//! Deployment changes re-trigger their parent.

use crate::controller::reconciler::{reconcile_object, Reconciler, ReconcilerError};
use crate::crd::Swxfll;
use crate::observability;
use crate::runtime::error_policy::handle_reconciliation_error;
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::Client;
use kube_runtime::controller::{self, Action, Controller};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run the controller until a shutdown signal arrives
pub async fn run_watch_loop(client: Client, reconciler: Arc<Reconciler>) -> Result<()> {
    let (parents, deployments): (Api<Swxfll>, Api<Deployment>) =
        match reconciler.config.watch_namespace.as_deref() {
            Some(namespace) => (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client, namespace),
            ),
            None => (Api::all(client.clone()), Api::all(client)),
        };

    let concurrency = reconciler.config.concurrency;
    info!("Watching Swxfll resources (concurrency {})", concurrency);

    Controller::new(parents, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile_object, handle_reconciliation_error, reconciler)
        .for_each(|result| async move { log_result(result) })
        .await;

    info!("Controller stopped");
    if let Ok(snapshot) = observability::metrics::gather_text() {
        debug!("Final metrics:\n{}", snapshot);
    }
    Ok(())
}

type ControllerResult =
    Result<(ObjectRef<Swxfll>, Action), controller::Error<ReconcilerError, watcher::Error>>;

fn log_result(result: ControllerResult) {
    match result {
        Ok((obj, action)) => debug!("Reconciled {}: {:?}", obj, action),
        // Already logged and scheduled by the error policy
        Err(controller::Error::ReconcilerFailed(e, obj)) => {
            debug!("Reconcile of {} failed: {}", obj, e);
        }
        Err(controller::Error::ObjectNotFound(obj)) => {
            debug!("{} was deleted before it could be reconciled", obj);
        }
        Err(e) => warn!("Controller stream error: {}", e),
    }
}
