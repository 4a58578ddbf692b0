//! Export store errors

use thiserror::Error;

/// Outcome of a failed create/delete against the export store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An export with the same namespace/name already exists
    #[error("ServiceExport already exists")]
    AlreadyExists,

    /// No export with that namespace/name exists
    #[error("ServiceExport not found")]
    NotFound,

    /// The API server does not serve the ServiceExport resource (CRD not installed)
    #[error("ServiceExport resource type is not registered")]
    TypeNotRegistered,

    /// Anything else (network, timeout, throttling, admission); retryable
    #[error("ServiceExport store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Classifies a failed create call from its HTTP status.
    ///
    /// A 404 on create means either the namespace is missing or the API
    /// server has no route for the resource at all; only the latter means
    /// the CRD is absent.
    pub fn from_create_status(code: u16, reason: &str, message: &str) -> Self {
        match code {
            409 => StoreError::AlreadyExists,
            404 if is_namespace_not_found(message) => StoreError::NotFound,
            404 => StoreError::TypeNotRegistered,
            _ => StoreError::Other(format!("{code} {reason}: {message}")),
        }
    }

    /// Classifies a failed delete call from its HTTP status.
    pub fn from_delete_status(code: u16, reason: &str, message: &str) -> Self {
        match code {
            404 => StoreError::NotFound,
            _ => StoreError::Other(format!("{code} {reason}: {message}")),
        }
    }

    /// Classifies a `kube::Error` returned by `Api::create`
    pub fn from_create_error(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ae) => Self::from_create_status(ae.code, &ae.reason, &ae.message),
            other => StoreError::Other(other.to_string()),
        }
    }

    /// Classifies a `kube::Error` returned by `Api::delete`
    pub fn from_delete_error(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ae) => Self::from_delete_status(ae.code, &ae.reason, &ae.message),
            other => StoreError::Other(other.to_string()),
        }
    }
}

fn is_namespace_not_found(message: &str) -> bool {
    message.starts_with("namespaces ") && message.ends_with("not found")
}
