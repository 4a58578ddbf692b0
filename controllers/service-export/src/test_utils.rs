//! Test utilities for unit testing the controller
//!
//! This module provides helpers for creating test data and setting up test scenarios.

#[cfg(test)]
use crate::error::ControllerError;
#[cfg(test)]
use crate::watcher::ServiceCache;
#[cfg(test)]
use k8s_openapi::api::core::v1::Service;
#[cfg(test)]
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(test)]
use std::time::Duration;
#[cfg(test)]
use tokio::sync::watch;

/// Helper to create a test Service
#[cfg(test)]
pub fn create_test_service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Pending,
    Synced,
    Failed,
}

/// In-memory Service cache whose sync is completed by the test
#[cfg(test)]
pub struct StaticServiceCache {
    services: Mutex<Vec<Arc<Service>>>,
    synced: watch::Sender<SyncState>,
}

#[cfg(test)]
impl StaticServiceCache {
    pub fn new(services: Vec<Service>) -> Self {
        let (synced, _) = watch::channel(SyncState::Pending);
        Self {
            services: Mutex::new(services.into_iter().map(Arc::new).collect()),
            synced,
        }
    }

    /// Mark the initial listing as complete
    pub fn mark_synced(&self) {
        self.synced.send_replace(SyncState::Synced);
    }

    /// Make the pending sync fail, as when the watch task dies
    pub fn mark_failed(&self) {
        self.synced.send_replace(SyncState::Failed);
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl ServiceCache for StaticServiceCache {
    fn list_all(&self) -> Vec<Arc<Service>> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn wait_for_sync(&self) -> Result<(), ControllerError> {
        let mut rx = self.synced.subscribe();
        let state = rx
            .wait_for(|state| *state != SyncState::Pending)
            .await
            .map(|state| *state)
            .map_err(|_| ControllerError::Watch("cache dropped".to_string()))?;
        match state {
            SyncState::Failed => Err(ControllerError::Watch("Service watch stream ended".to_string())),
            _ => Ok(()),
        }
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds
#[cfg(test)]
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
