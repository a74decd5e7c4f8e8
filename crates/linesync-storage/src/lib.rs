//! linesync Storage Backends
//!
//! Persists each document's commit log:
//! - Memory (default): Fast, volatile storage
//! - SQLite: Embedded persistence
//!
//! A journal writer task appends commits in the order the editor service
//! accepted them, and [`restore`] rebuilds a service from a backend on start.

pub mod journal;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use linesync_core::{Commit, DocumentId};

/// Storage backend trait
///
/// A stored log always starts with the initial commit at revision 0, so a
/// log of `n` commits ends at revision `n - 1`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Start an empty log for a new document
    async fn create(&self, id: &DocumentId) -> Result<(), StorageError>;

    /// Append the commit that produced `revision`
    async fn append(&self, id: &DocumentId, revision: usize, commit: &Commit) -> Result<(), StorageError>;

    /// Load a document's full log
    async fn load(&self, id: &DocumentId) -> Result<Option<Vec<Commit>>, StorageError>;

    /// List document IDs matching a pattern
    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError>;

    /// Get storage statistics
    async fn stats(&self) -> Result<StorageStats, StorageError>;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Revision conflict for {id}: expected {expected}, got {got}")]
    Conflict { id: String, expected: usize, got: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted log for {id}: {reason}")]
    Corrupted { id: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub document_count: usize,
    pub commit_count: usize,
    pub total_size_bytes: usize,
}

pub use journal::{restore, spawn_writer};
pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
