//! ExportStoreClient trait for mocking
//!
//! The controller only ever needs "create if absent" and "delete if
//! present"; both are expressed here so unit tests can swap in
//! `MockExportClient`.

use crate::error::StoreError;
use crate::models::ExportKey;

/// Create/delete access to ServiceExport objects.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ExportStoreClient: Send + Sync {
    /// Creates the export for `key`.
    async fn create(&self, key: &ExportKey) -> Result<(), StoreError>;

    /// Deletes the export for `key`.
    async fn delete(&self, key: &ExportKey) -> Result<(), StoreError>;
}
