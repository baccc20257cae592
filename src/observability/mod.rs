//! # Observability
//!
//! - `metrics` - Prometheus counters for reconciliation outcomes

pub mod metrics;
