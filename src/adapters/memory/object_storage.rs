//! In-Memory Object Storage Adapter
//!
//! Records uploaded objects in a map. Can be switched into a failing mode
//! to exercise the archival failure policy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ports::{ArchivalUploadError, ObjectStorage};

/// A stored object with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// In-memory bucket
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStorage {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    failures_remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl InMemoryObjectStorage {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// A bucket whose next `count` uploads fail.
    pub fn failing(count: usize) -> Self {
        let storage = Self::new();
        storage.fail_next(count);
        storage
    }

    /// Make the next `count` uploads fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Total upload attempts, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ArchivalUploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ArchivalUploadError::upload(key, "simulated storage failure"));
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
