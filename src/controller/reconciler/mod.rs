//! # Reconciler
//!
//! Core reconciliation logic for `Swxfll` resources.
//!
//! - `types` - Reconciler context, errors and outcomes
//! - `status` - Condition upsert and status persistence
//! - `finalizer` - Finalizer-gated deletion lifecycle
//! - `desired` - Desired Deployment synthesis
//! - `drift` - Observed vs desired comparison and merge
//! - `reconcile` - The per-invocation state machine

pub mod desired;
pub mod drift;
pub mod finalizer;
pub mod reconcile;
pub mod status;
pub mod types;

pub use desired::{image_tag, labels_for, resolve_image, synthesize, ConfigurationError};
pub use drift::{detect_drift, merge_desired, DriftField};
pub use finalizer::CleanupHook;
pub use reconcile::{reconcile, reconcile_object};
pub use status::{find_condition, is_condition_true, upsert_condition};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
