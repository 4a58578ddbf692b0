//! Export exclusion policy.
//!
//! Decides which Services must never be exported. The built-in policy
//! treats a Service as cluster-local when its in-cluster hostname matches
//! one of the configured cluster-local hosts.

use k8s_openapi::api::core::v1::Service;

/// Decides whether a Service is never exportable.
pub trait ExclusionPolicy: Send + Sync {
    fn is_excluded(&self, service: &Service) -> bool;
}

/// Host pattern: an exact hostname, a `*.`-prefixed suffix, or `*`
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Suffix(String),
    Exact(String),
}

impl HostPattern {
    fn parse(host: &str) -> Self {
        let host = host.trim().to_ascii_lowercase();
        if host == "*" {
            HostPattern::Any
        } else if let Some(suffix) = host.strip_prefix('*') {
            // keep the leading dot so "*.foo" does not match "barfoo"
            HostPattern::Suffix(suffix.to_string())
        } else {
            HostPattern::Exact(host)
        }
    }

    fn matches(&self, hostname: &str) -> bool {
        match self {
            HostPattern::Any => true,
            HostPattern::Suffix(suffix) => hostname.ends_with(suffix.as_str()),
            HostPattern::Exact(host) => hostname == host,
        }
    }
}

/// Excludes Services whose hostname is marked cluster-local
#[derive(Debug, Clone)]
pub struct ClusterLocalPolicy {
    domain_suffix: String,
    hosts: Vec<HostPattern>,
}

impl ClusterLocalPolicy {
    /// Builds the policy from the cluster domain suffix and extra hosts.
    ///
    /// `*.kube-system.svc.<domain_suffix>` is always cluster-local.
    pub fn new(domain_suffix: &str, extra_hosts: &[String]) -> Self {
        let domain_suffix = domain_suffix.trim_matches('.').to_ascii_lowercase();
        let mut hosts = vec![HostPattern::parse(&format!("*.kube-system.svc.{domain_suffix}"))];
        hosts.extend(extra_hosts.iter().map(|h| HostPattern::parse(h)));

        Self { domain_suffix, hosts }
    }

    /// In-cluster hostname of the Service, if it has a name and namespace
    pub fn hostname(&self, service: &Service) -> Option<String> {
        let name = service.metadata.name.as_deref()?;
        let namespace = service.metadata.namespace.as_deref()?;
        Some(format!("{name}.{namespace}.svc.{}", self.domain_suffix).to_ascii_lowercase())
    }
}

impl ExclusionPolicy for ClusterLocalPolicy {
    fn is_excluded(&self, service: &Service) -> bool {
        match self.hostname(service) {
            Some(hostname) => self.hosts.iter().any(|h| h.matches(&hostname)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_service;

    #[test]
    fn test_kube_system_is_cluster_local_by_default() {
        let policy = ClusterLocalPolicy::new("cluster.local", &[]);

        assert!(policy.is_excluded(&create_test_service("kube-system", "kube-dns")));
        assert!(!policy.is_excluded(&create_test_service("a", "svc1")));
    }

    #[test]
    fn test_hostname_uses_domain_suffix() {
        let policy = ClusterLocalPolicy::new(".corp.internal.", &[]);
        assert_eq!(
            policy.hostname(&create_test_service("a", "svc1")).as_deref(),
            Some("svc1.a.svc.corp.internal")
        );
        assert!(policy.is_excluded(&create_test_service("kube-system", "metrics-server")));
    }

    #[test]
    fn test_exact_and_wildcard_hosts() {
        let policy = ClusterLocalPolicy::new(
            "cluster.local",
            &[
                "db.shop.svc.cluster.local".to_string(),
                "*.infra.svc.cluster.local".to_string(),
            ],
        );

        assert!(policy.is_excluded(&create_test_service("shop", "db")));
        assert!(!policy.is_excluded(&create_test_service("shop", "checkout")));
        assert!(policy.is_excluded(&create_test_service("infra", "vault")));
        assert!(!policy.is_excluded(&create_test_service("notinfra", "vault")));
    }

    #[test]
    fn test_matching_ignores_case() {
        let policy = ClusterLocalPolicy::new("cluster.local", &["DB.Shop.svc.cluster.local".to_string()]);
        assert!(policy.is_excluded(&create_test_service("shop", "db")));
    }

    #[test]
    fn test_star_excludes_everything() {
        let policy = ClusterLocalPolicy::new("cluster.local", &["*".to_string()]);
        assert!(policy.is_excluded(&create_test_service("a", "svc1")));
    }
}
