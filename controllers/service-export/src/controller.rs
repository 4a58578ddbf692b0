//! Main controller implementation.
//!
//! This module contains the `Controller` struct that sequences startup:
//! wait for the Service cache, queue a create for every cached Service,
//! then drain the event queue until shutdown.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::health::HealthState;
use crate::policy::ClusterLocalPolicy;
use crate::queue::EventQueue;
use crate::reconciler::{AvailabilityGate, Reconciler, ServiceExportHandler};
use crate::watcher::{KubeServiceCache, ServiceCache};
use export_client::{ExportStoreClient, KubeExportClient};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Uninitialized,
    /// Waiting for the Service cache's first full listing
    Syncing,
    /// Queueing a create for every cached Service
    InitialReconcile,
    /// Processing live notifications
    Steady,
    Stopped,
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerPhase::Uninitialized => "Uninitialized",
            ControllerPhase::Syncing => "Syncing",
            ControllerPhase::InitialReconcile => "InitialReconcile",
            ControllerPhase::Steady => "Steady",
            ControllerPhase::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Main controller for ServiceExport management.
pub struct Controller<C, S> {
    cache: Arc<S>,
    handler: ServiceExportHandler,
    reconciler: Reconciler<C>,
    queue: EventQueue,
    health: Arc<HealthState>,
}

impl Controller<KubeExportClient, KubeServiceCache> {
    /// Wires the controller to the cluster and starts the Service watch.
    ///
    /// The returned handle is the watch task; it stops when `cancel` fires.
    pub async fn new(
        config: &ControllerConfig,
        health: Arc<HealthState>,
        cancel: CancellationToken,
    ) -> Result<(Self, JoinHandle<Result<(), ControllerError>>), ControllerError> {
        info!("Initializing ServiceExport Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let service_api: Api<Service> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let metrics = health.metrics.clone();
        let (queue, sender) = EventQueue::new(config.retry, metrics.clone());
        let policy = Arc::new(ClusterLocalPolicy::new(
            &config.domain_suffix,
            &config.cluster_local_hosts,
        ));
        let handler = ServiceExportHandler::new(sender, policy, metrics.clone());

        let (cache, watch_task) = KubeServiceCache::spawn(service_api, handler.clone(), cancel);
        let reconciler = Reconciler::new(KubeExportClient::new(kube_client), metrics);

        let controller = Controller::with_parts(Arc::new(cache), handler, reconciler, queue, health);
        Ok((controller, watch_task))
    }
}

impl<C, S> Controller<C, S>
where
    C: ExportStoreClient,
    S: ServiceCache,
{
    /// Assembles a controller from already-built parts.
    pub fn with_parts(
        cache: Arc<S>,
        handler: ServiceExportHandler,
        reconciler: Reconciler<C>,
        queue: EventQueue,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            cache,
            handler,
            reconciler,
            queue,
            health,
        }
    }

    /// Read handle on the availability gate
    pub fn gate(&self) -> AvailabilityGate {
        self.reconciler.gate()
    }

    /// Queues the add path for every Service currently in the cache.
    ///
    /// Repairs anything that changed while the controller was not running.
    /// Returns the number of Services visited.
    pub fn run_initial_sync(&self) -> usize {
        let services = self.cache.list_all();
        for service in &services {
            self.handler.on_service_added(service);
        }
        services.len()
    }

    /// Runs the controller until `cancel` fires.
    pub async fn start(self, cancel: CancellationToken) -> Result<(), ControllerError> {
        self.health.set_phase(ControllerPhase::Syncing);
        info!("Waiting for Service cache to sync...");

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Shutdown requested before the Service cache synced");
                self.health.set_phase(ControllerPhase::Stopped);
                return Ok(());
            }
            synced = self.cache.wait_for_sync() => {
                if let Err(e) = synced {
                    self.health.set_phase(ControllerPhase::Stopped);
                    return Err(e);
                }
            }
        }

        self.health.set_phase(ControllerPhase::InitialReconcile);
        info!("Syncing existing services and serviceexports...");
        let count = self.run_initial_sync();
        info!(services = count, "ServiceExport sync complete");

        let Controller {
            mut reconciler,
            queue,
            health,
            ..
        } = self;

        health.set_phase(ControllerPhase::Steady);
        info!("ServiceExport controller started");
        queue.run(&mut reconciler, cancel).await;

        health.set_phase(ControllerPhase::Stopped);
        info!("ServiceExport controller stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Metrics;
    use crate::queue::RetryPolicy;
    use crate::test_utils::{StaticServiceCache, create_test_service, wait_until};
    use export_client::{ExportKey, MockExportClient};
    use std::time::Duration;

    struct Fixture {
        controller: Controller<MockExportClient, StaticServiceCache>,
        cache: Arc<StaticServiceCache>,
        store: MockExportClient,
        health: Arc<HealthState>,
    }

    fn fixture(services: Vec<Service>) -> Fixture {
        let metrics = Arc::new(Metrics::new().unwrap());
        let health = Arc::new(HealthState::new(metrics.clone()));
        let (queue, sender) = EventQueue::new(
            RetryPolicy {
                delay: Duration::from_millis(5),
                max_attempts: None,
            },
            metrics.clone(),
        );
        let handler = ServiceExportHandler::new(
            sender,
            Arc::new(ClusterLocalPolicy::new("cluster.local", &[])),
            metrics.clone(),
        );
        let store = MockExportClient::new();
        let cache = Arc::new(StaticServiceCache::new(services));
        let controller = Controller::with_parts(
            cache.clone(),
            handler,
            Reconciler::new(store.clone(), metrics),
            queue,
            health.clone(),
        );
        Fixture { controller, cache, store, health }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ControllerPhase::InitialReconcile.to_string(), "InitialReconcile");
    }

    #[tokio::test]
    async fn test_resync_creates_one_export_per_exportable_service() {
        let f = fixture(vec![
            create_test_service("a", "svc1"),
            create_test_service("a", "svc2"),
            create_test_service("b", "svc3"),
            create_test_service("kube-system", "kube-dns"),
        ]);
        let mut phase = f.health.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.controller.start(cancel.clone()));

        assert_eq!(*phase.borrow_and_update(), ControllerPhase::Uninitialized);
        phase.wait_for(|p| *p == ControllerPhase::Syncing).await.unwrap();
        assert_eq!(f.store.create_calls(), 0);

        f.cache.mark_synced();
        phase.wait_for(|p| *p == ControllerPhase::Steady).await.unwrap();

        let store = f.store.clone();
        wait_until(|| store.create_calls() == 3).await;
        assert_eq!(
            f.store.exports(),
            vec![
                ExportKey::new("a", "svc1"),
                ExportKey::new("a", "svc2"),
                ExportKey::new("b", "svc3"),
            ]
        );

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(f.health.phase(), ControllerPhase::Stopped);
    }

    #[tokio::test]
    async fn test_resync_is_idempotent_against_existing_exports() {
        let f = fixture(vec![create_test_service("a", "svc1"), create_test_service("a", "svc2")]);
        f.store.add_export(ExportKey::new("a", "svc1"));
        f.cache.mark_synced();

        let cancel = CancellationToken::new();
        let mut phase = f.health.subscribe();
        let task = tokio::spawn(f.controller.start(cancel.clone()));
        phase.wait_for(|p| *p == ControllerPhase::Steady).await.unwrap();

        let store = f.store.clone();
        wait_until(|| store.create_calls() == 2).await;
        assert_eq!(f.store.exports().len(), 2);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_while_syncing_stops_cleanly() {
        let f = fixture(vec![create_test_service("a", "svc1")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        f.controller.start(cancel).await.unwrap();

        assert_eq!(f.health.phase(), ControllerPhase::Stopped);
        assert_eq!(f.store.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_cache_sync_publishes_stopped() {
        let f = fixture(vec![create_test_service("a", "svc1")]);
        f.cache.mark_failed();

        let result = f.controller.start(CancellationToken::new()).await;

        assert!(matches!(result, Err(ControllerError::Watch(_))));
        assert_eq!(f.health.phase(), ControllerPhase::Stopped);
        assert!(!f.health.is_ready());
        assert_eq!(f.store.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_gate_exposed_through_controller() {
        let f = fixture(vec![create_test_service("a", "svc1"), create_test_service("b", "svc2")]);
        f.store.set_type_registered(false);
        let gate = f.controller.gate();
        f.cache.mark_synced();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.controller.start(cancel.clone()));

        wait_until(|| !gate.is_open()).await;
        // the second create is suppressed by the closed gate
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.store.create_calls(), 1);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
