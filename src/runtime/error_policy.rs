//! # Error Policy
//!
//! Decides when a failed reconciliation is retried. Version conflicts come
//! back quickly (the next attempt re-fetches); every other failure backs off
//! per resource along a Fibonacci sequence, reset by the next success.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::Swxfll;
use crate::observability;
use crate::store::ObjectKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors for `kube_runtime::Controller`
pub fn handle_reconciliation_error(
    obj: Arc<Swxfll>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ObjectKey::of(obj.as_ref()).unwrap_or_else(|| ObjectKey::new("default", "unknown"));
    let delay = requeue_delay(&ctx, &key, error);
    Action::requeue(delay)
}

/// Delay before `key` is reconciled again after `error`
pub fn requeue_delay(ctx: &Reconciler, key: &ObjectKey, error: &ReconcilerError) -> Duration {
    if error.is_conflict() {
        warn!("Version conflict for {}; retrying from a fresh copy", key);
        observability::metrics::increment_requeues_total("conflict");
        return ctx.config.conflict_requeue;
    }

    error!("Reconciliation error for {}: {}", key, error);

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(key.to_string()).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (ctx.config.backoff_min_secs, 0)
        }
    };

    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, reason: {})",
        key,
        backoff_seconds,
        error_count,
        error.reason()
    );
    observability::metrics::increment_requeues_total(error.reason());
    Duration::from_secs(backoff_seconds)
}

/// Forget the failure history of `key` after a successful reconcile
pub fn reset_backoff(ctx: &Reconciler, key: &ObjectKey) {
    if let Ok(mut states) = ctx.backoff_states.lock() {
        states.remove(&key.to_string());
    }
}
