//! # Configuration Source
//!
//! Environment-style key/value lookup used to resolve the operand image.
//! Resolved on every reconcile, so a fixed configuration takes effect on the next retry.

use std::collections::HashMap;

pub trait ConfigSource: Send + Sync {
    /// Value for `name`, `None` when it is not defined
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of values
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    values: HashMap<String, String>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}
