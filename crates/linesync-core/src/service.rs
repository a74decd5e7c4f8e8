//! Editor service - document lifecycle, patch application and catch-up reads

use crate::document::{Commit, Document, DocumentId, Patch};
use crate::error::{Error, Result};
use crate::store::DocumentStore;
use crate::transform;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Current content of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub revision: usize,
    pub content: String,
}

/// Commits a client missed since `client_revision`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub client_revision: usize,
    pub server_revision: usize,
    pub commits: Vec<Commit>,
}

/// A commit accepted by [`EditorService::apply_patch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub revision: usize,
    pub commit: Commit,
}

/// A change to the history of some document, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Created {
        id: DocumentId,
    },
    Committed {
        id: DocumentId,
        revision: usize,
        commit: Commit,
    },
}

impl JournalEntry {
    pub fn id(&self) -> &DocumentId {
        match self {
            JournalEntry::Created { id } | JournalEntry::Committed { id, .. } => id,
        }
    }
}

/// Service statistics
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub document_count: usize,
}

/// Runs every document use case against a shared [`DocumentStore`]
pub struct EditorService {
    store: DocumentStore,
    /// Receives every create and commit, per document in history order
    journal: Option<mpsc::UnboundedSender<JournalEntry>>,
}

impl EditorService {
    pub fn new() -> Self {
        Self {
            store: DocumentStore::new(),
            journal: None,
        }
    }

    /// Report every create and commit to `journal`
    pub fn with_journal(mut self, journal: mpsc::UnboundedSender<JournalEntry>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Create an empty document
    pub fn create_document(&self, id: DocumentId) -> Result<()> {
        self.store.insert_with(Document::new(id.clone()), |document| {
            self.record(JournalEntry::Created {
                id: document.id().clone(),
            });
        })?;
        info!(doc_id = %id, "Document created");
        Ok(())
    }

    /// Rebuild a document from a persisted commit log.
    ///
    /// Restored documents are not journaled.
    pub fn restore(&self, id: DocumentId, commits: Vec<Commit>) -> Result<Arc<Document>> {
        let document = Document::from_commits(id, commits)?;
        debug!(doc_id = %document.id(), revision = document.revision(), "Document restored");
        self.store.insert(document)
    }

    /// Reconcile `patch` with the document's history and commit the result
    pub fn apply_patch(&self, id: &DocumentId, patch: Patch) -> Result<Applied> {
        let result = self.store.mutate(id, |document| {
            let reconciled = transform::reconcile(document, &patch)?;
            let commit = Commit::new(patch.id.clone(), reconciled.operations);
            let updated = document.with_commit(commit.clone(), reconciled.content);

            // Still under the document's writer lock, so entries stay in commit order
            self.record(JournalEntry::Committed {
                id: id.clone(),
                revision: updated.revision(),
                commit,
            });
            Ok(updated)
        });

        match result {
            Ok(document) => {
                let revision = document.revision();
                let commit = document.latest().clone();
                debug!(
                    doc_id = %id,
                    patch = %patch.id,
                    base_revision = patch.base_revision,
                    revision = revision,
                    operations = commit.operations.len(),
                    "Patch committed"
                );
                Ok(Applied { revision, commit })
            }
            Err(e @ Error::InternalInvariantViolation(_)) => {
                error!(doc_id = %id, patch = %patch.id, error = %e, "Patch reconciliation failed");
                Err(e)
            }
            Err(e) => {
                warn!(doc_id = %id, patch = %patch.id, error = %e, "Patch rejected");
                Err(e)
            }
        }
    }

    /// Current revision and content
    pub fn content(&self, id: &DocumentId) -> Result<ContentSnapshot> {
        let document = self.store.find(id)?;
        Ok(ContentSnapshot {
            revision: document.revision(),
            content: document.content().to_string(),
        })
    }

    /// Everything committed after `client_revision`
    pub fn diff(&self, id: &DocumentId, client_revision: usize) -> Result<Diff> {
        let document = self.store.find(id)?;
        let commits = document
            .commits_since(client_revision)?
            .into_iter()
            .cloned()
            .collect();
        Ok(Diff {
            client_revision,
            server_revision: document.revision(),
            commits,
        })
    }

    /// IDs of documents matching a pattern (glob syntax)
    pub fn list(&self, pattern: Option<&str>) -> Vec<DocumentId> {
        self.store.list(pattern)
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            document_count: self.store.len(),
        }
    }

    fn record(&self, entry: JournalEntry) {
        if let Some(journal) = &self.journal {
            if journal.send(entry).is_err() {
                warn!("Journal receiver dropped, history is no longer persisted");
            }
        }
    }
}

impl Default for EditorService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ContentOperation, Operation};

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn hello() -> Patch {
        Patch::new(
            "patchId1",
            0,
            vec![Operation::change_line(0, ContentOperation::insert_text(0, "Hello"))],
        )
    }

    fn world(base_revision: usize) -> Patch {
        Patch::new(
            "patchId2",
            base_revision,
            vec![
                Operation::insert_line(1),
                Operation::change_line(1, ContentOperation::insert_text(0, "World")),
            ],
        )
    }

    #[test]
    fn test_create_and_read_content() {
        let service = EditorService::new();
        service.create_document(id("doc:1")).unwrap();

        assert_eq!(
            service.content(&id("doc:1")).unwrap(),
            ContentSnapshot { revision: 0, content: String::new() }
        );
        assert_eq!(
            service.create_document(id("doc:1")),
            Err(Error::AlreadyExists("doc:1".into()))
        );
    }

    #[test]
    fn test_apply_patch_to_missing_document() {
        let service = EditorService::new();
        assert_eq!(
            service.apply_patch(&id("nope"), hello()),
            Err(Error::NotFound("nope".into()))
        );
    }

    #[test]
    fn test_concurrent_patches_and_diff() {
        let service = EditorService::new();
        let doc = id("doc:2");
        service.create_document(doc.clone()).unwrap();

        let first = service.apply_patch(&doc, hello()).unwrap();
        let second = service.apply_patch(&doc, world(0)).unwrap();

        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 2);
        assert_eq!(second.commit.patch_id, "patchId2");
        assert_eq!(
            service.content(&doc).unwrap(),
            ContentSnapshot { revision: 2, content: "Hello\nWorld".into() }
        );

        let diff = service.diff(&doc, 1).unwrap();
        assert_eq!(diff.client_revision, 1);
        assert_eq!(diff.server_revision, 2);
        assert_eq!(diff.commits, vec![second.commit]);

        assert!(service.diff(&doc, 2).unwrap().commits.is_empty());
    }

    #[test]
    fn test_invalid_revision_rejected() {
        let service = EditorService::new();
        let doc = id("doc:3");
        service.create_document(doc.clone()).unwrap();

        assert_eq!(
            service.apply_patch(&doc, world(5)),
            Err(Error::InvalidRevision { revision: 5, current: 0 })
        );
        assert_eq!(
            service.diff(&doc, 1),
            Err(Error::InvalidRevision { revision: 1, current: 0 })
        );
        assert_eq!(service.content(&doc).unwrap().revision, 0);
    }

    #[test]
    fn test_rejected_patch_commits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = EditorService::new().with_journal(tx);
        let doc = id("doc:4");
        service.create_document(doc.clone()).unwrap();

        let result = service.apply_patch(&doc, Patch::new("bad", 0, vec![Operation::delete_line(4)]));

        assert!(matches!(result, Err(Error::InvalidOperation(_))));
        assert_eq!(service.content(&doc).unwrap().revision, 0);
        assert_eq!(rx.try_recv().unwrap(), JournalEntry::Created { id: doc });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_journal_records_history_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = EditorService::new().with_journal(tx);
        let doc = id("doc:6");

        service.create_document(doc.clone()).unwrap();
        let first = service.apply_patch(&doc, hello()).unwrap();
        let second = service.apply_patch(&doc, world(0)).unwrap();

        assert_eq!(rx.try_recv().unwrap(), JournalEntry::Created { id: doc.clone() });
        assert_eq!(
            rx.try_recv().unwrap(),
            JournalEntry::Committed { id: doc.clone(), revision: 1, commit: first.commit }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            JournalEntry::Committed { id: doc, revision: 2, commit: second.commit }
        );
    }

    #[test]
    fn test_restore_from_diff() {
        let service = EditorService::new();
        let doc = id("doc:5");
        service.create_document(doc.clone()).unwrap();
        service.apply_patch(&doc, hello()).unwrap();
        service.apply_patch(&doc, world(0)).unwrap();

        let mut commits = vec![Commit::initial()];
        commits.extend(service.diff(&doc, 0).unwrap().commits);

        let replica = EditorService::new();
        let restored = replica.restore(doc.clone(), commits).unwrap();

        assert_eq!(restored.content(), "Hello\nWorld");
        assert_eq!(replica.content(&doc).unwrap(), service.content(&doc).unwrap());
    }

    #[test]
    fn test_diff_json_shape() {
        let diff = Diff {
            client_revision: 0,
            server_revision: 1,
            commits: vec![Commit::new("p1", vec![Operation::delete_line(0)])],
        };

        assert_eq!(
            serde_json::to_value(&diff).unwrap(),
            serde_json::json!({
                "clientRevision": 0,
                "serverRevision": 1,
                "commits": [
                    { "patchId": "p1", "operations": [{ "type": "delete-line", "lineIndex": 0 }] }
                ]
            })
        );
    }
}
