//! Kubernetes resource watchers.
//!
//! Mirrors Services into a `kube_runtime` reflector store and converts the
//! raw watch stream into add/delete notifications:
//! - `Apply` of an object not in the store is an add; updates are ignored.
//! - `Delete` of a known object is a delete.
//! - The first full listing is silent: the startup resync covers it.
//! - Later relists (after the watch falls out of date) are diffed against
//!   the store when they complete, so nothing missed in between is lost.

use crate::error::ControllerError;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use kube_runtime::reflector::{self, ObjectRef, Store, store::Writer};
use kube_runtime::{WatchStreamExt, watcher};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives Service notifications from the cache.
///
/// Called from the watch task; implementations must return quickly.
pub trait ServiceEventHandler: Send + Sync {
    fn on_add(&self, service: &Service);
    fn on_delete(&self, service: &Service);
}

/// Read access to the locally cached Services
#[async_trait::async_trait]
pub trait ServiceCache: Send + Sync {
    /// Snapshot of every Service currently known
    fn list_all(&self) -> Vec<Arc<Service>>;

    /// Resolves once the first full listing has been applied
    async fn wait_for_sync(&self) -> Result<(), ControllerError>;
}

/// Service cache fed by a Kubernetes watch
#[derive(Clone)]
pub struct KubeServiceCache {
    store: Store<Service>,
}

impl KubeServiceCache {
    /// Starts watching `api` in a background task that runs until `cancel` fires.
    pub fn spawn<H>(
        api: Api<Service>,
        handler: H,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<Result<(), ControllerError>>)
    where
        H: ServiceEventHandler + 'static,
    {
        let (store, writer) = reflector::store();
        let translator = EventTranslator::new(store.clone(), writer, handler);
        let task = tokio::spawn(translator.run(api, cancel));
        (Self { store }, task)
    }
}

#[async_trait::async_trait]
impl ServiceCache for KubeServiceCache {
    fn list_all(&self) -> Vec<Arc<Service>> {
        self.store.state()
    }

    async fn wait_for_sync(&self) -> Result<(), ControllerError> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|e| ControllerError::Watch(format!("Service cache writer dropped: {}", e)))
    }
}

/// Applies watch events to the store and fires notifications
struct EventTranslator<H> {
    reader: Store<Service>,
    writer: Writer<Service>,
    handler: H,
    synced: bool,
    relist: HashMap<ObjectRef<Service>, Service>,
}

impl<H: ServiceEventHandler> EventTranslator<H> {
    fn new(reader: Store<Service>, writer: Writer<Service>, handler: H) -> Self {
        Self {
            reader,
            writer,
            handler,
            synced: false,
            relist: HashMap::new(),
        }
    }

    async fn run(mut self, api: Api<Service>, cancel: CancellationToken) -> Result<(), ControllerError> {
        info!("Starting Service watcher");

        let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Service watcher stopped");
                    return Ok(());
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.apply(event),
                    Some(Err(e)) => warn!("Service watch error (will retry): {}", e),
                    None => return Err(ControllerError::Watch("Service watch stream ended".to_string())),
                },
            }
        }
    }

    fn apply(&mut self, event: watcher::Event<Service>) {
        match &event {
            watcher::Event::Apply(service) => {
                let known = self.reader.get(&ObjectRef::from_obj(service)).is_some();
                self.writer.apply_watcher_event(&event);
                if !known {
                    self.handler.on_add(service);
                }
            }
            watcher::Event::Delete(service) => {
                let known = self.reader.get(&ObjectRef::from_obj(service)).is_some();
                self.writer.apply_watcher_event(&event);
                if known {
                    self.handler.on_delete(service);
                }
            }
            watcher::Event::Init => {
                debug!("Service listing started");
                self.relist.clear();
                self.writer.apply_watcher_event(&event);
            }
            watcher::Event::InitApply(service) => {
                if self.synced {
                    self.relist.insert(ObjectRef::from_obj(service), service.clone());
                }
                self.writer.apply_watcher_event(&event);
            }
            watcher::Event::InitDone => {
                if !self.synced {
                    self.writer.apply_watcher_event(&event);
                    self.synced = true;
                    info!(services = self.reader.state().len(), "Service cache synced");
                    return;
                }

                let relist = std::mem::take(&mut self.relist);
                let vanished: Vec<Arc<Service>> = self
                    .reader
                    .state()
                    .into_iter()
                    .filter(|s| !relist.contains_key(&ObjectRef::from_obj(s.as_ref())))
                    .collect();
                let appeared: Vec<Service> = relist
                    .into_iter()
                    .filter(|(key, _)| self.reader.get(key).is_none())
                    .map(|(_, service)| service)
                    .collect();

                self.writer.apply_watcher_event(&event);
                debug!(
                    added = appeared.len(),
                    deleted = vanished.len(),
                    "Service relist complete"
                );

                for service in &vanished {
                    self.handler.on_delete(service);
                }
                for service in &appeared {
                    self.handler.on_add(service);
                }
            }
        }
    }
}
