//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables, and the
//! key/value source the reconciler resolves the operand image from.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.

mod controller;
mod source;

pub use controller::ControllerConfig;
pub use source::{ConfigSource, EnvConfigSource, StaticConfigSource};
