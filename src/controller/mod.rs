//! # Controller
//!
//! - `reconciler` - Reconciliation of Swxfll resources into Deployments
//! - `events` - Kubernetes Event publishing
//! - `backoff` - Retry delay calculation

pub mod backoff;
pub mod events;
pub mod reconciler;
