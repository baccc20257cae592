//! # Controller Settings
//!
//! Scheduling, requeue and timeout settings loaded from environment variables.

use crate::constants::*;
use std::time::Duration;

/// Controller configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Configuration key the operand image is looked up under
    pub image_env_key: String,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Maximum number of resources reconciled in parallel
    pub concurrency: u16,
    /// Delay before verifying a freshly created Deployment
    pub requeue_after_create: Duration,
    /// Delay before verifying a drift correction
    pub requeue_after_update: Duration,
    /// Delay before retrying after a version conflict
    pub conflict_requeue: Duration,
    /// Lower bound of the error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Upper bound of the error backoff (seconds)
    pub backoff_max_secs: u64,
    /// Upper bound for a single API store call
    pub api_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            image_env_key: DEFAULT_IMAGE_ENV_KEY.to_string(),
            watch_namespace: None,
            concurrency: DEFAULT_RECONCILE_CONCURRENCY,
            requeue_after_create: Duration::from_secs(DEFAULT_REQUEUE_AFTER_CREATE_SECS),
            requeue_after_update: Duration::from_secs(DEFAULT_REQUEUE_AFTER_UPDATE_SECS),
            conflict_requeue: Duration::from_secs(DEFAULT_CONFLICT_REQUEUE_SECS),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value lookup with defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(&lookup, key, default));
        let backoff_min_secs = parse_or(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS).max(1);
        Self {
            image_env_key: lookup("IMAGE_ENV_KEY")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_ENV_KEY.to_string()),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()),
            concurrency: parse_or(&lookup, "RECONCILE_CONCURRENCY", DEFAULT_RECONCILE_CONCURRENCY)
                .max(1),
            requeue_after_create: secs("REQUEUE_AFTER_CREATE_SECS", DEFAULT_REQUEUE_AFTER_CREATE_SECS),
            requeue_after_update: secs("REQUEUE_AFTER_UPDATE_SECS", DEFAULT_REQUEUE_AFTER_UPDATE_SECS),
            conflict_requeue: secs("CONFLICT_REQUEUE_SECS", DEFAULT_CONFLICT_REQUEUE_SECS),
            backoff_min_secs,
            backoff_max_secs: parse_or(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)
                .max(backoff_min_secs),
            api_timeout: secs("API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS),
        }
    }
}

/// Read a value or return the default when it is absent or unparsable
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ControllerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config_from(&[]), ControllerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config_from(&[
            ("IMAGE_ENV_KEY", "OPERAND_IMAGE"),
            ("WATCH_NAMESPACE", "apps"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("REQUEUE_AFTER_CREATE_SECS", "30"),
            ("API_TIMEOUT_SECS", "10"),
        ]);
        assert_eq!(cfg.image_env_key, "OPERAND_IMAGE");
        assert_eq!(cfg.watch_namespace.as_deref(), Some("apps"));
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.requeue_after_create, Duration::from_secs(30));
        assert_eq!(cfg.api_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let cfg = config_from(&[
            ("RECONCILE_CONCURRENCY", "many"),
            ("REQUEUE_AFTER_UPDATE_SECS", "-1"),
            ("WATCH_NAMESPACE", ""),
        ]);
        assert_eq!(cfg.concurrency, DEFAULT_RECONCILE_CONCURRENCY);
        assert_eq!(
            cfg.requeue_after_update,
            Duration::from_secs(DEFAULT_REQUEUE_AFTER_UPDATE_SECS)
        );
        assert_eq!(cfg.watch_namespace, None);
    }

    #[test]
    fn test_backoff_bounds_are_ordered() {
        let cfg = config_from(&[("BACKOFF_MIN_SECS", "60"), ("BACKOFF_MAX_SECS", "10")]);
        assert_eq!(cfg.backoff_min_secs, 60);
        assert_eq!(cfg.backoff_max_secs, 60);
    }
}
