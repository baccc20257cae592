//! Swxfll Operator Library
//!
//! Reconciles `Swxfll` custom resources into Deployments.
//! Unit tests live in the module files; reconciliation scenarios are under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod store;

// Re-export CRD types for convenience
pub use crd::*;
