//! Export identity

use kube::Resource;
use std::fmt;

/// Namespace/name shared by a Service and its ServiceExport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExportKey {
    pub namespace: String,
    pub name: String,
}

impl ExportKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a namespaced object, or `None` if the snapshot lacks a
    /// name or namespace.
    pub fn for_resource<K: Resource>(obj: &K) -> Option<Self> {
        let name = obj.meta().name.as_deref().filter(|n| !n.is_empty())?;
        let namespace = obj.meta().namespace.as_deref().filter(|n| !n.is_empty())?;
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ExportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(namespace: Option<&str>, name: Option<&str>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: name.map(String::from),
                namespace: namespace.map(String::from),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_key_from_service() {
        let key = ExportKey::for_resource(&service(Some("a"), Some("svc1")));
        assert_eq!(key, Some(ExportKey::new("a", "svc1")));
        assert_eq!(key.map(|k| k.to_string()).as_deref(), Some("a/svc1"));
    }

    #[test]
    fn test_key_requires_namespace_and_name() {
        assert_eq!(ExportKey::for_resource(&service(None, Some("svc1"))), None);
        assert_eq!(ExportKey::for_resource(&service(Some("a"), None)), None);
        assert_eq!(ExportKey::for_resource(&service(Some(""), Some("svc1"))), None);
    }
}
