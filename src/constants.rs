//! # Constants
//!
//! Names, condition vocabulary and configuration defaults shared across the operator.

/// Finalizer marker owned by this controller
pub const FINALIZER: &str = "cache.swxfll.com/finalizer";

/// Event reporter name
pub const CONTROLLER_NAME: &str = "swxfll-operator";

/// Configuration key holding the operand image reference
pub const DEFAULT_IMAGE_ENV_KEY: &str = "SWXFLL_IMAGE";

/// Name of the operand container (and of its port)
pub const CONTAINER_NAME: &str = "swxfll";

// Condition types
pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_DEGRADED: &str = "Degraded";

// Condition reasons
pub const REASON_RECONCILING: &str = "Reconciling";
pub const REASON_FINALIZING: &str = "Finalizing";

// Event reasons
pub const EVENT_REASON_DELETING: &str = "Deleting";

// Label keys
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_CREATED_BY: &str = "app.kubernetes.io/created-by";

/// Every label key written by the synthesizer, in the order it writes them
pub const OWNED_LABEL_KEYS: [&str; 5] = [
    LABEL_NAME,
    LABEL_INSTANCE,
    LABEL_VERSION,
    LABEL_PART_OF,
    LABEL_CREATED_BY,
];

// Controller defaults (overridable via environment, see config::ControllerConfig)
pub const DEFAULT_RECONCILE_CONCURRENCY: u16 = 4;
pub const DEFAULT_REQUEUE_AFTER_CREATE_SECS: u64 = 60;
pub const DEFAULT_REQUEUE_AFTER_UPDATE_SECS: u64 = 5;
pub const DEFAULT_CONFLICT_REQUEUE_SECS: u64 = 1;
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
