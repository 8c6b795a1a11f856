//! Transient media store
//!
//! Holds rendered video bodies in memory behind `blob:reel/<uuid>`
//! references. A reference stays valid until it is released; releasing is
//! idempotent and counted so leaks and double releases show up in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Prefix of every reference minted by [`MediaStore`]
pub const BLOB_PREFIX: &str = "blob:reel/";

/// A stored media body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub content_type: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug, Default)]
struct MediaInner {
    blobs: HashMap<String, StoredMedia>,
    released: u64,
}

/// Shared handle to the in-memory media store
#[derive(Debug, Clone, Default)]
pub struct MediaStore {
    inner: Arc<Mutex<MediaInner>>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MediaInner> {
        // A panic while holding the lock cannot leave the map half-written
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a body and mint a reference to it
    pub fn insert(&self, bytes: Vec<u8>, content_type: impl Into<String>) -> String {
        let reference = format!("{}{}", BLOB_PREFIX, Uuid::new_v4());
        let media = StoredMedia {
            content_type: content_type.into(),
            bytes: Arc::new(bytes),
        };
        debug!(reference = %reference, size = media.bytes.len(), "Stored transient media");
        self.lock().blobs.insert(reference.clone(), media);
        reference
    }

    pub fn get(&self, reference: &str) -> Option<StoredMedia> {
        self.lock().blobs.get(reference).cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.lock().blobs.contains_key(reference)
    }

    /// Release one reference; returns false if it was unknown or already released
    pub fn release(&self, reference: &str) -> bool {
        let mut inner = self.lock();
        if inner.blobs.remove(reference).is_some() {
            inner.released += 1;
            debug!(reference = %reference, "Released transient media");
            true
        } else {
            false
        }
    }

    /// Release every outstanding reference, returning how many were released
    pub fn release_all(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.blobs.len();
        inner.blobs.clear();
        inner.released += count as u64;
        if count > 0 {
            debug!(count, "Released all transient media");
        }
        count
    }

    /// References currently held
    pub fn outstanding(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Releases performed over the store's lifetime
    pub fn released_count(&self) -> u64 {
        self.lock().released
    }
}
