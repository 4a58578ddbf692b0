//! ServiceExport Controller
//!
//! Keeps a multi-cluster `ServiceExport` object in step with every
//! Service in the cluster, so that each Service is published to the
//! rest of the cluster set under its own namespace and name.
//!
//! Cluster-local Services (by default anything in `kube-system`) are
//! never exported. If the ServiceExport CRD is not installed the
//! controller stops creating exports until it is restarted.

mod config;
mod controller;
mod error;
mod health;
mod policy;
mod queue;
mod reconciler;
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::health::{HealthState, Metrics, run_health_server};
use controller::Controller;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configure the rustls crypto provider before any TLS connection is made
    if rustls::crypto::ring::default_provider().install_default().is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        warn!("Failed to install rustls crypto provider");
    }

    info!("Starting ServiceExport Controller");

    let config = ControllerConfig::from_env()?;
    config.log();

    let metrics = Arc::new(Metrics::new()?);
    let health = Arc::new(HealthState::new(metrics));
    let cancel = CancellationToken::new();

    let health_task = tokio::spawn(run_health_server(
        health.clone(),
        config.health_port,
        cancel.clone(),
    ));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, stopping controller...");
        shutdown.cancel();
    });

    let (controller, watch_task) = Controller::new(&config, health, cancel.clone()).await?;
    let gate = controller.gate();
    let result = controller.start(cancel.clone()).await;
    if !gate.is_open() {
        warn!("ServiceExport creation was disabled during this run; install the CRD and restart");
    }

    // The watch and health server share the token; make sure they wind down
    // even when the controller returned on its own.
    cancel.cancel();
    match watch_task.await {
        Ok(Err(e)) => error!(error = %e, "Service watch failed"),
        Err(e) => error!(error = %e, "Service watch task panicked"),
        Ok(Ok(())) => {}
    }
    match health_task.await {
        Ok(Err(e)) => error!(error = %e, "Health server failed"),
        Err(e) => error!(error = %e, "Health server task panicked"),
        Ok(Ok(())) => {}
    }

    result
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
