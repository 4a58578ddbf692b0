//! ServiceExport CRD
//!
//! Marks a Service as visible to the other clusters of a ClusterSet.
//! The object carries no desired state: its existence in the Service's
//! namespace, under the Service's name, is the export.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the Multi-Cluster Services API
pub const MCS_API_GROUP: &str = "multicluster.x-k8s.io";

/// Served version of the ServiceExport CRD
pub const SERVICE_EXPORT_VERSION: &str = "v1alpha1";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "multicluster.x-k8s.io",
    version = "v1alpha1",
    kind = "ServiceExport",
    plural = "serviceexports",
    shortname = "svcex",
    namespaced,
    status = "ServiceExportStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportSpec {}

impl ServiceExport {
    /// Builds an export for the Service `namespace/name`.
    pub fn for_service(namespace: &str, name: &str) -> Self {
        let mut export = ServiceExport::new(name, ServiceExportSpec::default());
        export.metadata.namespace = Some(namespace.to_string());
        export
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportStatus {
    /// Current service state, written by the MCS implementation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ServiceExportCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExportCondition {
    /// Condition type ("Valid", "Conflict")
    #[serde(rename = "type")]
    pub type_: ServiceExportConditionType,

    /// "True", "False" or "Unknown"
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
/// ServiceExport condition types defined by the MCS API
pub enum ServiceExportConditionType {
    /// The export is valid and will be propagated
    Valid,

    /// The export conflicts with exports of the same Service in other clusters
    Conflict,
}
