//! # Swxfll Operator
//!
//! A Kubernetes operator that keeps one Deployment per `Swxfll` resource in
//! line with its spec.
//!
//! ## Overview
//!
//! For each `Swxfll` the operator:
//!
//! 1. **Initializes status** - Sets `Available=Unknown` on first sight
//! 2. **Adds a finalizer** - So deletion waits for cleanup
//! 3. **Creates the Deployment** - Replicas, port and image derived from the spec and `SWXFLL_IMAGE`
//! 4. **Corrects drift** - Restores replicas, port, image and labels when they change
//! 5. **Finalizes** - Emits a deletion event, runs cleanup, marks `Degraded` and releases the finalizer

use anyhow::Result;
use swxfll_operator::runtime::initialization::initialize;
use swxfll_operator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(init_result.client, init_result.reconciler).await
}
