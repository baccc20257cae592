//! # Finalizer Lifecycle
//!
//! `NoFinalizer -> FinalizerPresent -> Finalizing -> Removed`
//!
//! The marker keeps the API server from completing a delete until cleanup has
//! run. Each transition is its own persisted step and the object is re-fetched
//! between steps, so no write is made from a stale copy.

use crate::constants::*;
use crate::controller::events::EventSeverity;
use crate::controller::reconciler::status::set_condition;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Condition, ConditionStatus, Swxfll};
use crate::store::ObjectKey;
use async_trait::async_trait;
use kube::Resource;
use tracing::{error, info, warn};

/// Extra work to finish before the resource may be deleted, such as taking a
/// backup or removing resources that are not owner-referenced.
///
/// Owned Deployments need no hook; the API server cascades their deletion.
#[async_trait]
pub trait CleanupHook: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn cleanup(&self, obj: &Swxfll) -> anyhow::Result<()>;
}

/// Fetch the current copy; vanished objects end the reconcile via `NotFound`
pub async fn refetch(reconciler: &Reconciler, key: &ObjectKey) -> Result<Swxfll, ReconcilerError> {
    reconciler
        .parents
        .get(key)
        .await
        .map_err(|e| ReconcilerError::from_store(key, e))?
        .ok_or_else(|| ReconcilerError::NotFound(key.clone()))
}

/// `NoFinalizer -> FinalizerPresent`: add the marker and persist the parent
pub async fn add_finalizer(
    reconciler: &Reconciler,
    obj: &Swxfll,
    key: &ObjectKey,
) -> Result<(), ReconcilerError> {
    info!("Adding finalizer to {}", key);
    let mut updated = obj.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    reconciler
        .parents
        .update(&updated)
        .await
        .map_err(|e| ReconcilerError::from_store(key, e))?;
    Ok(())
}

/// Emit the audit event, then run every registered hook
///
/// The first failing hook aborts cleanup.
pub async fn run_cleanup(reconciler: &Reconciler, obj: &Swxfll, key: &ObjectKey) -> Result<(), ReconcilerError> {
    reconciler.events.emit(
        &obj.object_ref(&()),
        EventSeverity::Warning,
        EVENT_REASON_DELETING,
        format!(
            "Custom Resource {} is being deleted from the namespace {}",
            key.name, key.namespace
        ),
    );

    for hook in &reconciler.cleanup_hooks {
        if let Err(source) = hook.cleanup(obj).await {
            error!("Cleanup hook {} failed for {}: {:#}", hook.name(), key, source);
            return Err(ReconcilerError::FinalizerIncomplete {
                key: key.clone(),
                source,
            });
        }
    }
    Ok(())
}

/// `FinalizerPresent -> Finalizing -> Removed`
///
/// The terminal Degraded condition is persisted before the marker is removed,
/// and a failed cleanup leaves the marker in place.
pub async fn finalize(reconciler: &Reconciler, obj: Swxfll, key: &ObjectKey) -> Result<(), ReconcilerError> {
    if !obj.has_finalizer() {
        return Ok(());
    }
    info!("Performing finalizer operations for {} before deletion", key);

    let downgrade = Condition::new(
        CONDITION_AVAILABLE,
        ConditionStatus::Unknown,
        REASON_FINALIZING,
        format!("Performing finalizer operations for the custom resource: {}", key.name),
    )
    .with_generation(obj.metadata.generation);
    let obj = if set_condition(reconciler, &obj, downgrade).await? {
        refetch(reconciler, key).await?
    } else {
        obj
    };

    if let Err(e) = run_cleanup(reconciler, &obj, key).await {
        warn!("Keeping finalizer on {} until cleanup succeeds", key);
        return Err(e);
    }

    let obj = refetch(reconciler, key).await?;
    let degraded = Condition::new(
        CONDITION_DEGRADED,
        ConditionStatus::True,
        REASON_FINALIZING,
        format!(
            "Finalizer operations for custom resource {} name were successfully accomplished",
            key.name
        ),
    )
    .with_generation(obj.metadata.generation);
    set_condition(reconciler, &obj, degraded).await?;

    info!("Removing finalizer from {} after successful cleanup", key);
    let mut obj = refetch(reconciler, key).await?;
    if let Some(finalizers) = obj.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER);
    }
    reconciler
        .parents
        .update(&obj)
        .await
        .map_err(|e| ReconcilerError::from_store(key, e))?;
    Ok(())
}
