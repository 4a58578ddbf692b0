//! Reconciliation logic for ServiceExports.
//!
//! Split in two halves:
//! - `ServiceExportHandler` runs on the watch side. It evaluates the
//!   exclusion policy against the notification snapshot and enqueues a
//!   `WorkItem`; it never performs I/O.
//! - `Reconciler` runs on the single queue worker. It talks to the export
//!   store and owns the availability gate.

use crate::error::ControllerError;
use crate::health::Metrics;
use crate::policy::ExclusionPolicy;
use crate::queue::{QueueSender, WorkHandler, WorkItem};
use crate::watcher::ServiceEventHandler;
use export_client::{ExportKey, ExportStoreClient, StoreError};
use k8s_openapi::api::core::v1::Service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Latch that disables export creation once the ServiceExport type is
/// found missing. Open at startup; never reopens.
#[derive(Debug, Clone)]
pub struct AvailabilityGate {
    open: Arc<AtomicBool>,
}

impl Default for AvailabilityGate {
    fn default() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl AvailabilityGate {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Closes the gate. Returns `true` only for the call that closed it.
    fn close(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }
}

/// Turns Service notifications into queued work
#[derive(Clone)]
pub struct ServiceExportHandler {
    queue: QueueSender,
    policy: Arc<dyn ExclusionPolicy>,
    metrics: Arc<Metrics>,
}

impl ServiceExportHandler {
    pub fn new(queue: QueueSender, policy: Arc<dyn ExclusionPolicy>, metrics: Arc<Metrics>) -> Self {
        Self { queue, policy, metrics }
    }

    /// Enqueues creation of the Service's export unless the Service is excluded.
    ///
    /// Exclusion is decided here, from the snapshot in hand; a Service whose
    /// exclusion status changes before the item runs is not re-checked.
    pub fn on_service_added(&self, service: &Service) {
        self.metrics.record_notification("add");

        let Some(key) = ExportKey::for_resource(service) else {
            warn!("Ignoring added Service without name or namespace");
            return;
        };
        if self.policy.is_excluded(service) {
            debug!(namespace = %key.namespace, name = %key.name, "Service is cluster-local, not exporting");
            self.metrics.excluded_total.inc();
            return;
        }

        self.queue.push(WorkItem::Create(key));
    }

    /// Enqueues removal of the Service's export, whatever the gate state.
    pub fn on_service_deleted(&self, service: &Service) {
        self.metrics.record_notification("delete");

        let Some(key) = ExportKey::for_resource(service) else {
            warn!("Ignoring deleted Service without name or namespace");
            return;
        };

        self.queue.push(WorkItem::Delete(key));
    }
}

impl ServiceEventHandler for ServiceExportHandler {
    fn on_add(&self, service: &Service) {
        self.on_service_added(service);
    }

    fn on_delete(&self, service: &Service) {
        self.on_service_deleted(service);
    }
}

/// Applies work items to the export store
pub struct Reconciler<C> {
    client: C,
    gate: AvailabilityGate,
    metrics: Arc<Metrics>,
}

impl<C: ExportStoreClient> Reconciler<C> {
    /// Creates a new reconciler instance.
    pub fn new(client: C, metrics: Arc<Metrics>) -> Self {
        Self {
            client,
            gate: AvailabilityGate::default(),
            metrics,
        }
    }

    /// Read handle on the availability gate
    pub fn gate(&self) -> AvailabilityGate {
        self.gate.clone()
    }

    /// Creates the export for `key` if the gate is open.
    ///
    /// `AlreadyExists` counts as success, as does `NotFound` (the namespace is
    /// gone). `TypeNotRegistered` closes the gate
    /// and also counts as success, since retrying cannot help until the CRD
    /// is installed and the controller restarted.
    pub async fn create_export(&self, key: &ExportKey) -> Result<(), ControllerError> {
        if !self.gate.is_open() {
            debug!(namespace = %key.namespace, name = %key.name, "ServiceExport type unavailable, skipping create");
            self.metrics.record_store_operation("create", "skipped");
            return Ok(());
        }

        match self.client.create(key).await {
            Ok(()) => {
                info!(namespace = %key.namespace, name = %key.name, "Created ServiceExport");
                self.metrics.record_store_operation("create", "created");
                Ok(())
            }
            Err(StoreError::AlreadyExists) => {
                debug!(namespace = %key.namespace, name = %key.name, "ServiceExport already exists");
                self.metrics.record_store_operation("create", "already_exists");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                // the Service went away with its namespace; its delete is already queued
                info!(namespace = %key.namespace, name = %key.name, "Namespace no longer exists, skipping create");
                self.metrics.record_store_operation("create", "namespace_missing");
                Ok(())
            }
            Err(StoreError::TypeNotRegistered) => {
                if self.gate.close() {
                    error!(
                        "ServiceExport CRD not found, shutting down ServiceExport sync. \
                         Install the CRD and restart the controller"
                    );
                    self.metrics.export_type_available.set(0);
                }
                self.metrics.record_store_operation("create", "type_not_registered");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_store_operation("create", "error");
                Err(e.into())
            }
        }
    }

    /// Deletes the export for `key`. A missing export is success.
    pub async fn delete_export(&self, key: &ExportKey) -> Result<(), ControllerError> {
        match self.client.delete(key).await {
            Ok(()) => {
                info!(namespace = %key.namespace, name = %key.name, "Deleted ServiceExport");
                self.metrics.record_store_operation("delete", "deleted");
                Ok(())
            }
            Err(StoreError::NotFound) | Err(StoreError::TypeNotRegistered) => {
                debug!(namespace = %key.namespace, name = %key.name, "ServiceExport already gone");
                self.metrics.record_store_operation("delete", "not_found");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_store_operation("delete", "error");
                Err(e.into())
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: ExportStoreClient> WorkHandler for Reconciler<C> {
    async fn handle(&mut self, item: &WorkItem) -> Result<(), ControllerError> {
        match item {
            WorkItem::Create(key) => self.create_export(key).await,
            WorkItem::Delete(key) => self.delete_export(key).await,
        }
    }
}
