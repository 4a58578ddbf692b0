//! Mock ExportStoreClient for unit testing
//!
//! Stores exports in memory with the same idempotency answers as the API
//! server, records every call, and can be told to fail.

use crate::error::StoreError;
use crate::models::ExportKey;
use crate::store_trait::ExportStoreClient;
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call observed by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create(ExportKey),
    Delete(ExportKey),
}

#[derive(Default)]
struct MockState {
    exports: BTreeSet<ExportKey>,
    calls: Vec<StoreCall>,
    type_registered: bool,
    injected_failures: VecDeque<StoreError>,
}

/// Mock export store for testing
///
/// Clones share state, so a test can keep one handle for assertions while
/// the reconciler owns another.
#[derive(Clone)]
pub struct MockExportClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockExportClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExportClient {
    /// Create an empty store with the ServiceExport type registered
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                type_registered: true,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing export (for test setup)
    pub fn add_export(&self, key: ExportKey) {
        self.lock().exports.insert(key);
    }

    /// Simulate the CRD being absent (or present again)
    pub fn set_type_registered(&self, registered: bool) {
        self.lock().type_registered = registered;
    }

    /// Make the next call fail with `error` before touching the store.
    /// Injected failures are consumed in FIFO order, one per call.
    pub fn fail_next(&self, error: StoreError) {
        self.lock().injected_failures.push_back(error);
    }

    /// Whether an export exists for `key`
    pub fn contains(&self, key: &ExportKey) -> bool {
        self.lock().exports.contains(key)
    }

    /// Current exports, sorted
    pub fn exports(&self) -> Vec<ExportKey> {
        self.lock().exports.iter().cloned().collect()
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of create calls received so far
    pub fn create_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Create(_)))
            .count()
    }

    /// Number of delete calls received so far
    pub fn delete_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Delete(_)))
            .count()
    }
}

#[async_trait::async_trait]
impl ExportStoreClient for MockExportClient {
    async fn create(&self, key: &ExportKey) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Create(key.clone()));

        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        if !state.type_registered {
            return Err(StoreError::TypeNotRegistered);
        }
        if state.exports.insert(key.clone()) {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists)
        }
    }

    async fn delete(&self, key: &ExportKey) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Delete(key.clone()));

        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        if state.exports.remove(key) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let mock = MockExportClient::new();
        let key = ExportKey::new("a", "svc1");

        assert_eq!(mock.create(&key).await, Ok(()));
        assert_eq!(mock.create(&key).await, Err(StoreError::AlreadyExists));
        assert_eq!(mock.exports(), vec![key]);
        assert_eq!(mock.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mock = MockExportClient::new();
        let key = ExportKey::new("a", "svc1");

        assert_eq!(mock.delete(&key).await, Err(StoreError::NotFound));
        mock.add_export(key.clone());
        assert_eq!(mock.delete(&key).await, Ok(()));
        assert!(!mock.contains(&key));
    }

    #[tokio::test]
    async fn test_unregistered_type_rejects_create() {
        let mock = MockExportClient::new();
        mock.set_type_registered(false);

        let result = mock.create(&ExportKey::new("a", "svc1")).await;
        assert_eq!(result, Err(StoreError::TypeNotRegistered));
        assert!(mock.exports().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_consumed_once() {
        let mock = MockExportClient::new();
        let key = ExportKey::new("a", "svc1");
        mock.fail_next(StoreError::Other("timeout".to_string()));

        assert!(mock.create(&key).await.is_err());
        assert_eq!(mock.create(&key).await, Ok(()));
        assert_eq!(
            mock.calls(),
            vec![StoreCall::Create(key.clone()), StoreCall::Create(key)]
        );
    }
}
