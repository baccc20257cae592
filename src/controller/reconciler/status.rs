//! # Status Management
//!
//! Condition bookkeeping for the Swxfll status subresource.
//! Conditions are keyed by type; readers look them up by type, never by position.

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Condition, ConditionStatus, Swxfll};
use crate::store::ObjectKey;
use tracing::debug;

/// Insert or update the condition of `condition.type`
///
/// The transition time only moves when the status value changes; an identical
/// status keeps the original time and just refreshes reason and message.
/// Returns whether anything changed, so callers can skip the write.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition.r#type) else {
        if condition.last_transition_time.is_none() {
            condition.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
        }
        conditions.push(condition);
        return true;
    };

    if existing.status != condition.status {
        condition.last_transition_time = condition
            .last_transition_time
            .or_else(|| Some(chrono::Utc::now().to_rfc3339()));
        *existing = condition;
        return true;
    }

    let changed = existing.reason != condition.reason
        || existing.message != condition.message
        || existing.observed_generation != condition.observed_generation;
    existing.reason = condition.reason;
    existing.message = condition.message;
    existing.observed_generation = condition.observed_generation;
    changed
}

pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

pub fn is_condition_true(conditions: &[Condition], r#type: &str) -> bool {
    find_condition(conditions, r#type).is_some_and(|c| c.status == ConditionStatus::True)
}

/// Apply `condition` to the resource and persist it through the status subresource
///
/// Skips the write when the condition is already current.
/// Returns whether a write was made.
pub async fn set_condition(
    reconciler: &Reconciler,
    obj: &Swxfll,
    condition: Condition,
) -> Result<bool, ReconcilerError> {
    let mut updated = obj.clone();
    let status = updated.status.get_or_insert_with(Default::default);
    if !upsert_condition(&mut status.conditions, condition) {
        debug!(
            "Skipping status update for {:?} - conditions unchanged",
            obj.metadata.name
        );
        return Ok(false);
    }

    let key = ObjectKey::of(obj).ok_or_else(|| ReconcilerError::InvalidObject("missing name".into()))?;
    reconciler
        .parents
        .update_status(&updated)
        .await
        .map_err(|e| ReconcilerError::from_store(&key, e))?;
    Ok(true)
}
