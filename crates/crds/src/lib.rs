//! Multi-Cluster Services CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the ServiceExport controller.

pub mod service_export;

pub use service_export::*;
