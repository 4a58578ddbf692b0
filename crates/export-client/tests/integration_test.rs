//! Integration tests for the Kubernetes export store
//!
//! These tests require a cluster reachable through the default kubeconfig
//! with the ServiceExport CRD installed (`cargo run -p crds --bin crdgen | kubectl apply -f -`).
//! Set EXPORT_TEST_NAMESPACE to choose the namespace (defaults to "default").

use export_client::{ExportKey, ExportStoreClient, KubeExportClient, StoreError};

fn test_key(name: &str) -> ExportKey {
    let namespace = std::env::var("EXPORT_TEST_NAMESPACE")
        .unwrap_or_else(|_| "default".to_string());
    ExportKey::new(namespace, name)
}

#[tokio::test]
#[ignore] // Requires running cluster with the ServiceExport CRD
async fn test_create_and_delete_export() {
    let client = kube::Client::try_default().await
        .expect("Failed to create kube client");
    let store = KubeExportClient::new(client);
    let key = test_key("export-client-it-create");

    store.create(&key).await.expect("Failed to create ServiceExport");
    assert_eq!(store.create(&key).await, Err(StoreError::AlreadyExists));

    store.delete(&key).await.expect("Failed to delete ServiceExport");
    assert_eq!(store.delete(&key).await, Err(StoreError::NotFound));
}

#[tokio::test]
#[ignore]
async fn test_create_in_missing_namespace() {
    let client = kube::Client::try_default().await
        .expect("Failed to create kube client");
    let store = KubeExportClient::new(client);
    let key = ExportKey::new("export-client-it-no-such-namespace", "svc");

    let result = store.create(&key).await;
    assert_eq!(result, Err(StoreError::NotFound));
}
