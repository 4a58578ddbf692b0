//! Kubernetes-backed export store
//!
//! Talks to the API server through `kube::Api<ServiceExport>`. A namespaced
//! `Api` is built per call since exports live in the namespace of whatever
//! Service triggered them.

use crate::error::StoreError;
use crate::models::ExportKey;
use crate::store_trait::ExportStoreClient;
use crds::ServiceExport;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// ServiceExport client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeExportClient {
    client: Client,
}

impl KubeExportClient {
    /// Create a new export client from a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ServiceExport> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ExportStoreClient for KubeExportClient {
    async fn create(&self, key: &ExportKey) -> Result<(), StoreError> {
        let export = ServiceExport::for_service(&key.namespace, &key.name);
        debug!(namespace = %key.namespace, name = %key.name, "Creating ServiceExport");

        self.api(&key.namespace)
            .create(&PostParams::default(), &export)
            .await
            .map(|_| ())
            .map_err(StoreError::from_create_error)
    }

    async fn delete(&self, key: &ExportKey) -> Result<(), StoreError> {
        debug!(namespace = %key.namespace, name = %key.name, "Deleting ServiceExport");

        self.api(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(StoreError::from_delete_error)
    }
}
