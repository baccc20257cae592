//! # Initialization
//!
//! Controller initialization logic including tracing, rustls setup, metrics,
//! configuration and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - Tracing subscriber setup
/// - rustls crypto provider setup
/// - Metrics registration
/// - Configuration loading
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swxfll_operator=info".into()),
        )
        .init();

    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed; keeping it");
    }

    info!("Starting Swxfll operator v{}", env!("CARGO_PKG_VERSION"));

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let config = ControllerConfig::from_env();
    info!(
        "Configuration: image key={}, namespace={}, concurrency={}",
        config.image_env_key,
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.concurrency
    );
    if std::env::var(&config.image_env_key).is_err() {
        warn!(
            "{} is not set; Deployments cannot be created until it is",
            config.image_env_key
        );
    }

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = Arc::new(Reconciler::for_cluster(client.clone(), config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult { client, reconciler })
}
