//! In-memory remote store for testing
//!
//! Provides a [`RemoteStore`] that keeps documents in memory, with knobs for
//! simulating an unreachable store, rejected writes, and slow round trips.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parsons_core::{InMemoryRemoteStore, RemoteStore};
//!
//! let remote = InMemoryRemoteStore::new();
//! let id = remote.create_document("logs", data).await.unwrap();
//!
//! // Make the next two writes fail
//! remote.fail_next(2);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::RemoteError;
use crate::remote::{DocId, DocumentPatch, RemoteStore};

/// A mock remote document store
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    /// Documents keyed by (collection, id)
    documents: DashMap<(String, DocId), Map<String, Value>>,
    /// Counter for generated document ids
    next_id: AtomicU64,
    /// Every call fails with `Unreachable` while set
    offline: AtomicBool,
    /// Number of upcoming calls that fail with `Rejected`
    fail_next: AtomicUsize,
    /// Total calls received, failed ones included
    calls: AtomicUsize,
    /// Simulated round-trip time
    latency: Option<Duration>,
}

impl InMemoryRemoteStore {
    /// Create an empty, reachable store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose calls each take `latency` to resolve
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Simulate the store going offline or coming back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next `count` calls fail with a rejection
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }

    /// Get a copy of a document's fields
    pub fn document(&self, collection: &str, doc_id: &DocId) -> Option<Map<String, Value>> {
        self.documents
            .get(&(collection.to_string(), doc_id.clone()))
            .map(|doc| doc.clone())
    }

    /// Get all documents in a collection, ordered by id
    pub fn documents(&self, collection: &str) -> Vec<(DocId, Map<String, Value>)> {
        let mut docs: Vec<_> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        docs
    }

    async fn round_trip(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::unreachable("store is offline"));
        }

        let rejected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(RemoteError::rejected("injected failure"));
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create_document(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<DocId, RemoteError> {
        self.round_trip().await?;

        let doc_id = DocId::new(format!(
            "doc-{:06}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        trace!(collection, doc_id = %doc_id, fields = data.len(), "Creating document");
        self.documents
            .insert((collection.to_string(), doc_id.clone()), data);

        debug!(collection, doc_id = %doc_id, "Document created");
        Ok(doc_id)
    }

    async fn update_document(
        &self,
        collection: &str,
        doc_id: &DocId,
        patch: DocumentPatch,
    ) -> Result<(), RemoteError> {
        self.round_trip().await?;

        let mut doc = self
            .documents
            .get_mut(&(collection.to_string(), doc_id.clone()))
            .ok_or_else(|| RemoteError::NotFound(doc_id.to_string()))?;
        patch.apply_to(doc.value_mut());

        debug!(collection, doc_id = %doc_id, "Document updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let store = InMemoryRemoteStore::new();
        let id = store
            .create_document("logs", data(json!({ "log": [1] })))
            .await
            .unwrap();
        assert_eq!(store.document_count("logs"), 1);
        assert_eq!(store.document_count("other"), 0);

        store
            .update_document(
                "logs",
                &id,
                DocumentPatch::new().array_union("log", vec![json!(1), json!(2)]),
            )
            .await
            .unwrap();

        let doc = store.document("logs", &id).unwrap();
        assert_eq!(doc["log"], json!([1, 2]));
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn test_update_missing_document() {
        let store = InMemoryRemoteStore::new();
        let result = tokio_test::block_on(store.update_document(
            "logs",
            &DocId::new("nope"),
            DocumentPatch::new(),
        ));
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offline_and_injected_failures() {
        let store = InMemoryRemoteStore::new();

        store.set_offline(true);
        let result = store.create_document("logs", Map::new()).await;
        assert!(matches!(result, Err(RemoteError::Unreachable(_))));
        store.set_offline(false);

        store.fail_next(1);
        let result = store.create_document("logs", Map::new()).await;
        assert!(matches!(result, Err(RemoteError::Rejected(_))));

        // Only one failure was injected
        assert!(store.create_document("logs", Map::new()).await.is_ok());
        assert_eq!(store.document_count("logs"), 1);
    }

    #[tokio::test]
    async fn test_generated_ids_are_distinct() {
        let store = InMemoryRemoteStore::new();
        let a = store.create_document("logs", Map::new()).await.unwrap();
        let b = store.create_document("logs", Map::new()).await.unwrap();
        assert_ne!(a, b);

        let docs = store.documents("logs");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, a);
    }
}
