//! Controller-specific error types.
//!
//! This module defines error types specific to the ServiceExport Controller
//! that are not covered by upstream library errors.

use export_client::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the ServiceExport Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Export store rejected an operation (retryable from the queue's point of view)
    #[error("Export store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
