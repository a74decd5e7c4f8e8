//! In-memory storage backend

use crate::{Storage, StorageError, StorageStats};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use linesync_core::store::matches_pattern;
use linesync_core::{Commit, DocumentId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory storage backend
///
/// Fast, volatile storage suitable for development and tests.
/// Data is lost when the process exits.
pub struct MemoryStorage {
    /// Commit logs: id -> serialized commits, indexed by revision
    logs: DashMap<String, Vec<Vec<u8>>>,
    /// Total size tracking
    total_size: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
            total_size: AtomicUsize::new(0),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(commit: &Commit) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(commit).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create(&self, id: &DocumentId) -> Result<(), StorageError> {
        let initial = encode(&Commit::initial())?;

        match self.logs.entry(id.as_str().to_string()) {
            Entry::Occupied(entry) => Err(StorageError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                self.total_size.fetch_add(initial.len(), Ordering::Relaxed);
                entry.insert(vec![initial]);
                Ok(())
            }
        }
    }

    async fn append(&self, id: &DocumentId, revision: usize, commit: &Commit) -> Result<(), StorageError> {
        let bytes = encode(commit)?;

        let mut log = self
            .logs
            .get_mut(id.as_str())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if log.len() != revision {
            return Err(StorageError::Conflict {
                id: id.to_string(),
                expected: log.len(),
                got: revision,
            });
        }

        self.total_size.fetch_add(bytes.len(), Ordering::Relaxed);
        log.push(bytes);
        Ok(())
    }

    async fn load(&self, id: &DocumentId) -> Result<Option<Vec<Commit>>, StorageError> {
        match self.logs.get(id.as_str()) {
            Some(log) => {
                let commits = log
                    .iter()
                    .map(|bytes| serde_json::from_slice(bytes))
                    .collect::<Result<Vec<Commit>, _>>()
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(commits))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError> {
        let mut ids = Vec::new();
        for entry in self.logs.iter() {
            let key = entry.key();
            let matches = pattern.map_or(true, |p| matches_pattern(key, p));
            if matches {
                if let Ok(id) = DocumentId::new(key.clone()) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            document_count: self.logs.len(),
            commit_count: self.logs.iter().map(|log| log.len()).sum(),
            total_size_bytes: self.total_size.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linesync_core::{ContentOperation, Operation};

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn hello() -> Commit {
        Commit::new(
            "patchId1",
            vec![Operation::change_line(0, ContentOperation::insert_text(0, "Hello"))],
        )
    }

    #[tokio::test]
    async fn test_create_append_load() {
        let storage = MemoryStorage::new();
        let doc = id("test:1");

        storage.create(&doc).await.unwrap();
        storage.append(&doc, 1, &hello()).await.unwrap();

        let commits = storage.load(&doc).await.unwrap().unwrap();
        assert_eq!(commits, vec![Commit::initial(), hello()]);
    }

    #[tokio::test]
    async fn test_create_twice() {
        let storage = MemoryStorage::new();
        let doc = id("test:2");

        storage.create(&doc).await.unwrap();
        assert!(matches!(
            storage.create(&doc).await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_append_out_of_order() {
        let storage = MemoryStorage::new();
        let doc = id("test:3");

        assert!(matches!(
            storage.append(&doc, 1, &hello()).await,
            Err(StorageError::NotFound(_))
        ));

        storage.create(&doc).await.unwrap();
        assert!(matches!(
            storage.append(&doc, 2, &hello()).await,
            Err(StorageError::Conflict { expected: 1, got: 2, .. })
        ));
        assert_eq!(storage.load(&doc).await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_pattern() {
        let storage = MemoryStorage::new();

        storage.create(&id("notes:1")).await.unwrap();
        storage.create(&id("notes:2")).await.unwrap();
        storage.create(&id("draft:1")).await.unwrap();

        let notes = storage.list(Some("notes:*")).await.unwrap();
        assert_eq!(notes.len(), 2);

        let all = storage.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_stats() {
        let storage = MemoryStorage::new();
        let doc = id("test:4");

        storage.create(&doc).await.unwrap();
        storage.append(&doc, 1, &hello()).await.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.commit_count, 2);
        assert!(stats.total_size_bytes > 0);
    }
}
