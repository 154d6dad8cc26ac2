// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use namespace_operator::config::Config;
use namespace_operator::kubernetes::KubeClusterApi;
use namespace_operator::policy::AnnotationPolicy;
use namespace_operator::reconcile::NamespaceController;
use namespace_operator::reconcilers::{NamespaceSetReconciler, NamespaceWatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing; RUST_LOG overrides LOG_LEVEL
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting namespace operator");
    info!(
        "Configuration loaded: excluded_namespaces={:?}, managed_only={}, max_attempts={}",
        config.excluded_namespaces, config.managed_only, config.max_attempts
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let cluster = Arc::new(KubeClusterApi::new(client.clone()));
    let policy = Arc::new(AnnotationPolicy::new(config.default_resource_quota.clone()));
    let enable_namespace_sets = config.enable_namespace_sets;

    // The controller owns the per-namespace workers; the watcher feeds it
    let (controller, handle) = NamespaceController::new(cluster, policy, config, shutdown.clone());
    let watcher = NamespaceWatcher::new(client.clone(), handle, shutdown.clone());
    let namespace_sets = NamespaceSetReconciler::new(client, shutdown.clone());

    info!("Starting reconcilers...");

    tokio::try_join!(controller.run(), watcher.run(), async {
        if enable_namespace_sets {
            namespace_sets.run().await
        } else {
            info!("NamespaceSet reconciler disabled");
            Ok(())
        }
    })?;

    info!("Namespace operator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
