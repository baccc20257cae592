//! # Reconcile
//!
//! One invocation per resource identity:
//! `Start -> EnsureStatusInitialized -> EnsureFinalizer -> (Deletion | SteadyState) -> End`.
//!
//! 1. Fetch the Swxfll; a missing object settles without writes
//! 2. Initialize status with Available=Unknown
//! 3. Add the finalizer
//! 4. Deleting: run the finalizer lifecycle and stop
//! 5. Otherwise create the Deployment, or correct drift on the owned fields
//!
//! Every status or metadata write is followed by a re-fetch. Failures are
//! returned to the scheduler for requeue; nothing retries in place.

use crate::constants::*;
use crate::controller::reconciler::desired::{resolve_image, synthesize};
use crate::controller::reconciler::drift::{detect_drift, merge_desired};
use crate::controller::reconciler::finalizer::{add_finalizer, finalize, refetch};
use crate::controller::reconciler::status::set_condition;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{Condition, ConditionStatus, Swxfll};
use crate::observability;
use crate::runtime::error_policy::reset_backoff;
use crate::store::ObjectKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Reconcile the Swxfll identified by `key`
#[instrument(skip_all, fields(namespace = %key.namespace, name = %key.name))]
pub async fn reconcile(
    key: &ObjectKey,
    reconciler: &Reconciler,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let start = Instant::now();
    observability::metrics::increment_reconciliations();

    let result = match reconcile_steps(key, reconciler).await {
        Err(ReconcilerError::NotFound(gone)) => {
            info!("{} no longer exists; nothing left to reconcile", gone);
            Ok(ReconcileOutcome::Settled)
        }
        other => other,
    };

    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        observability::metrics::increment_reconciliation_errors(e.reason());
    }
    result
}

/// Entry point for `kube_runtime::Controller`
///
/// The watched copy only identifies the resource; [`reconcile`] fetches its own.
pub async fn reconcile_object(
    obj: Arc<Swxfll>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::of(obj.as_ref())
        .ok_or_else(|| ReconcilerError::InvalidObject("Swxfll without a name".to_string()))?;
    let outcome = reconcile(&key, &ctx).await?;
    reset_backoff(&ctx, &key);
    if let ReconcileOutcome::RequeueAfter(delay) = outcome {
        debug!("Requeueing {} in {}s to verify progress", key, delay.as_secs());
        observability::metrics::increment_requeues_total("verify");
    }
    Ok(outcome.into())
}

async fn reconcile_steps(
    key: &ObjectKey,
    reconciler: &Reconciler,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(mut obj) = reconciler
        .parents
        .get(key)
        .await
        .map_err(|e| ReconcilerError::from_store(key, e))?
    else {
        info!("Swxfll {} not found; ignoring since object must be deleted", key);
        return Ok(ReconcileOutcome::Settled);
    };

    if obj.conditions().is_empty() {
        let starting = Condition::new(
            CONDITION_AVAILABLE,
            ConditionStatus::Unknown,
            REASON_RECONCILING,
            "Starting reconciliation",
        )
        .with_generation(obj.metadata.generation);
        set_condition(reconciler, &obj, starting).await?;
        obj = refetch(reconciler, key).await?;
    }

    if !obj.is_deleting() && !obj.has_finalizer() {
        add_finalizer(reconciler, &obj, key).await?;
        obj = refetch(reconciler, key).await?;
    }

    if obj.is_deleting() {
        finalize(reconciler, obj, key).await?;
        return Ok(ReconcileOutcome::Settled);
    }

    sync_deployment(reconciler, &obj, key).await
}

/// Steady state: make the owned Deployment match the spec
async fn sync_deployment(
    reconciler: &Reconciler,
    parent: &Swxfll,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let image = resolve_image(
        reconciler.config_source.as_ref(),
        &reconciler.config.image_env_key,
    )
    .inspect_err(|e| error!("Failed to define the Deployment for {}: {}", key, e))?;
    let desired = synthesize(parent, &image)?;

    let observed = reconciler
        .deployments
        .get(key)
        .await
        .map_err(|e| ReconcilerError::from_store(key, e))?;

    let Some(observed) = observed else {
        info!("Creating a new Deployment {}", key);
        if let Err(e) = reconciler.deployments.create(&desired).await {
            let err = ReconcilerError::from_store(key, e);
            report_failure(
                reconciler,
                parent,
                format!(
                    "Failed to create Deployment for the custom resource ({}): ({})",
                    key.name, err
                ),
            )
            .await;
            return Err(err);
        }
        observability::metrics::increment_deployments_created();
        return Ok(ReconcileOutcome::RequeueAfter(
            reconciler.config.requeue_after_create,
        ));
    };

    let drift = detect_drift(&observed, &desired);
    if !drift.is_empty() {
        let fields: Vec<String> = drift.iter().map(ToString::to_string).collect();
        info!("Deployment {} drifted on [{}]; updating", key, fields.join(", "));
        let merged = merge_desired(&observed, &desired);
        if let Err(e) = reconciler.deployments.update(&merged).await {
            let err = ReconcilerError::from_store(key, e);
            report_failure(
                reconciler,
                parent,
                format!(
                    "Failed to update Deployment for the custom resource ({}): ({})",
                    key.name, err
                ),
            )
            .await;
            return Err(err);
        }
        observability::metrics::increment_deployments_updated();
        return Ok(ReconcileOutcome::RequeueAfter(
            reconciler.config.requeue_after_update,
        ));
    }

    let available = Condition::new(
        CONDITION_AVAILABLE,
        ConditionStatus::True,
        REASON_RECONCILING,
        format!(
            "Deployment for custom resource ({}) with {} replicas created successfully",
            key.name, parent.spec.size
        ),
    )
    .with_generation(parent.metadata.generation);
    set_condition(reconciler, parent, available).await?;
    Ok(ReconcileOutcome::Settled)
}

/// Record a failed child write on the Available condition
///
/// Best effort: the original error is what gets returned either way.
async fn report_failure(reconciler: &Reconciler, parent: &Swxfll, message: String) {
    let condition = Condition::new(
        CONDITION_AVAILABLE,
        ConditionStatus::False,
        REASON_RECONCILING,
        message,
    )
    .with_generation(parent.metadata.generation);
    if let Err(e) = set_condition(reconciler, parent, condition).await {
        warn!("Failed to record failure on status: {}", e);
    }
}
