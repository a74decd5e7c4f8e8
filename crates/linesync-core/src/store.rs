//! Document store - per-document serialized mutation over immutable snapshots

use crate::document::{Document, DocumentId};
use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// One document's current snapshot plus the lock serializing its writers.
///
/// Readers only touch `current`, so they never wait on a mutation in progress.
struct Slot {
    writer: Mutex<()>,
    current: RwLock<Arc<Document>>,
}

impl Slot {
    fn new(document: Document) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(document)),
        }
    }

    fn snapshot(&self) -> Arc<Document> {
        self.current.read().clone()
    }
}

/// Holds every document, indexed by ID
pub struct DocumentStore {
    documents: DashMap<String, Arc<Slot>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Create an empty document at revision 0
    pub fn create(&self, id: DocumentId) -> Result<Arc<Document>> {
        self.insert(Document::new(id))
    }

    /// Install an already-built document under its ID
    pub fn insert(&self, document: Document) -> Result<Arc<Document>> {
        self.insert_with(document, |_| {})
    }

    /// Like [`insert`](Self::insert), running `then` before any other caller
    /// can reach the new document
    pub fn insert_with<F>(&self, document: Document, then: F) -> Result<Arc<Document>>
    where
        F: FnOnce(&Document),
    {
        let key = document.id().as_str().to_string();

        match self.documents.entry(key) {
            Entry::Occupied(entry) => Err(Error::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let slot = entry.insert(Arc::new(Slot::new(document)));
                let snapshot = slot.snapshot();
                then(&snapshot);
                Ok(snapshot)
            }
        }
    }

    /// Current snapshot of a document
    pub fn find(&self, id: &DocumentId) -> Result<Arc<Document>> {
        Ok(self.slot(id)?.snapshot())
    }

    /// Replace a document with `f(current)`.
    ///
    /// Mutations of one document run one at a time, in lock order; `f` must
    /// not touch the store. On error nothing is published.
    pub fn mutate<F>(&self, id: &DocumentId, f: F) -> Result<Arc<Document>>
    where
        F: FnOnce(&Document) -> Result<Document>,
    {
        let slot = self.slot(id)?;
        let _writer = slot.writer.lock();

        let current = slot.snapshot();
        let updated = Arc::new(f(&current)?);
        *slot.current.write() = updated.clone();

        Ok(updated)
    }

    /// IDs of all documents matching a pattern (glob syntax)
    pub fn list(&self, pattern: Option<&str>) -> Vec<DocumentId> {
        self.documents
            .iter()
            .filter(|entry| pattern.map_or(true, |p| matches_pattern(entry.key(), p)))
            .map(|entry| entry.value().snapshot().id().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    // Clone the slot out so the map shard is not held during a mutation
    fn slot(&self, id: &DocumentId) -> Result<Arc<Slot>> {
        self.documents
            .get(id.as_str())
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple glob pattern matching
pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return key.starts_with(prefix);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return key.ends_with(suffix);
    }

    key == pattern
}
