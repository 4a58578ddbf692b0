//! Controller configuration.
//!
//! All settings come from environment variables read once at startup.

use crate::error::ControllerError;
use crate::queue::RetryPolicy;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_DOMAIN_SUFFIX: &str = "cluster.local";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Runtime configuration for the ServiceExport Controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch Services in; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Cluster DNS suffix used to build Service hostnames
    pub domain_suffix: String,
    /// Extra cluster-local hosts on top of the built-in defaults
    pub cluster_local_hosts: Vec<String>,
    /// Retry behavior of the event queue
    pub retry: RetryPolicy,
    /// Port of the probe/metrics server
    pub health_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            domain_suffix: DEFAULT_DOMAIN_SUFFIX.to_string(),
            cluster_local_hosts: Vec::new(),
            retry: RetryPolicy::default(),
            health_port: DEFAULT_HEALTH_PORT,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let namespace = non_empty("WATCH_NAMESPACE");
        let domain_suffix = non_empty("DOMAIN_SUFFIX")
            .unwrap_or_else(|| DEFAULT_DOMAIN_SUFFIX.to_string());
        let cluster_local_hosts = non_empty("CLUSTER_LOCAL_HOSTS")
            .map(|hosts| {
                hosts
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let delay_ms = match non_empty("EXPORT_RETRY_DELAY_MS") {
            Some(v) => parse_number::<u64>("EXPORT_RETRY_DELAY_MS", &v)?,
            None => DEFAULT_RETRY_DELAY_MS,
        };
        let max_attempts = match non_empty("EXPORT_RETRY_MAX_ATTEMPTS") {
            Some(v) => Some(parse_number::<u32>("EXPORT_RETRY_MAX_ATTEMPTS", &v)?).filter(|n| *n > 0),
            None => None,
        };
        let health_port = match non_empty("HEALTH_PORT") {
            Some(v) => parse_number::<u16>("HEALTH_PORT", &v)?,
            None => DEFAULT_HEALTH_PORT,
        };

        Ok(Self {
            namespace,
            domain_suffix,
            cluster_local_hosts,
            retry: RetryPolicy {
                delay: Duration::from_millis(delay_ms),
                max_attempts,
            },
            health_port,
        })
    }

    /// Log the effective configuration
    pub fn log(&self) {
        info!("Configuration:");
        info!("  Namespace: {}", self.namespace.as_deref().unwrap_or("all namespaces"));
        info!("  Domain suffix: {}", self.domain_suffix);
        info!("  Extra cluster-local hosts: {:?}", self.cluster_local_hosts);
        info!("  Retry delay: {:?}", self.retry.delay);
        match self.retry.max_attempts {
            Some(n) => info!("  Retry max attempts: {}", n),
            None => info!("  Retry max attempts: unbounded"),
        }
        info!("  Health port: {}", self.health_port);
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ControllerError> {
    value.parse::<T>().map_err(|_| {
        ControllerError::InvalidConfig(format!("{key} must be a non-negative integer, got {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn test_all_variables() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "shop"),
            ("DOMAIN_SUFFIX", "corp.internal"),
            ("CLUSTER_LOCAL_HOSTS", "*.infra.svc.corp.internal, db.shop.svc.corp.internal,"),
            ("EXPORT_RETRY_DELAY_MS", "250"),
            ("EXPORT_RETRY_MAX_ATTEMPTS", "5"),
            ("HEALTH_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("shop"));
        assert_eq!(config.domain_suffix, "corp.internal");
        assert_eq!(
            config.cluster_local_hosts,
            vec!["*.infra.svc.corp.internal", "db.shop.svc.corp.internal"]
        );
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.health_port, 9090);
    }

    #[test]
    fn test_zero_max_attempts_means_unbounded() {
        let config = ControllerConfig::from_lookup(lookup(&[("EXPORT_RETRY_MAX_ATTEMPTS", "0")])).unwrap();
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn test_blank_namespace_watches_everything() {
        let config = ControllerConfig::from_lookup(lookup(&[("WATCH_NAMESPACE", "  ")])).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = ControllerConfig::from_lookup(lookup(&[("EXPORT_RETRY_DELAY_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("EXPORT_RETRY_DELAY_MS")));

        let err = ControllerConfig::from_lookup(lookup(&[("HEALTH_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
