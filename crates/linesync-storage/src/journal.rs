//! Journal writer and startup restore

use crate::{Storage, StorageError};
use linesync_core::{DocumentId, EditorService, JournalEntry};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Drain `journal` into `storage` in order until every sender is dropped.
///
/// The first failed write for a document stops persistence of that
/// document: its later entries would only extend a log with a gap. Other
/// documents carry on. The task resolves to the documents whose stored
/// history stopped short, in the order they failed.
pub fn spawn_writer(
    storage: Arc<dyn Storage>,
    mut journal: mpsc::UnboundedReceiver<JournalEntry>,
) -> JoinHandle<Vec<DocumentId>> {
    tokio::spawn(async move {
        let mut failed: Vec<DocumentId> = Vec::new();
        let mut stopped: HashSet<DocumentId> = HashSet::new();
        let mut written = 0usize;

        while let Some(entry) = journal.recv().await {
            if stopped.contains(entry.id()) {
                debug!(entry = ?entry, "Skipping journal entry for unpersisted document");
                continue;
            }

            let result = match &entry {
                JournalEntry::Created { id } => storage.create(id).await,
                JournalEntry::Committed { id, revision, commit } => {
                    storage.append(id, *revision, commit).await
                }
            };

            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    error!(
                        document = %entry.id(),
                        error = %e,
                        entry = ?entry,
                        "Failed to persist journal entry, no further changes to this document will be stored"
                    );
                    stopped.insert(entry.id().clone());
                    failed.push(entry.id().clone());
                }
            }
        }

        debug!(written, failed = failed.len(), "Journal closed");
        failed
    })
}

/// Load every stored document into `service`, returning how many were restored
pub async fn restore(storage: &dyn Storage, service: &EditorService) -> Result<usize, StorageError> {
    let ids = storage.list(None).await?;
    let mut restored = 0;

    for id in ids {
        let commits = match storage.load(&id).await? {
            Some(commits) => commits,
            None => continue,
        };

        service
            .restore(id.clone(), commits)
            .map_err(|e| StorageError::Corrupted {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        restored += 1;
    }

    info!(documents = restored, "Documents restored from storage");
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use linesync_core::{Commit, ContentOperation, DocumentId, Operation, Patch};

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_writer_persists_history() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = spawn_writer(storage.clone(), rx);

        let service = EditorService::new().with_journal(tx);
        let doc = id("doc:1");
        service.create_document(doc.clone()).unwrap();
        service
            .apply_patch(
                &doc,
                Patch::new(
                    "patchId1",
                    0,
                    vec![Operation::change_line(0, ContentOperation::insert_text(0, "Hello"))],
                ),
            )
            .unwrap();
        service
            .apply_patch(
                &doc,
                Patch::new(
                    "patchId2",
                    0,
                    vec![
                        Operation::insert_line(1),
                        Operation::change_line(1, ContentOperation::insert_text(0, "World")),
                    ],
                ),
            )
            .unwrap();

        // Dropping the service closes the journal
        drop(service);
        assert!(writer.await.unwrap().is_empty());

        let commits = storage.load(&doc).await.unwrap().unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0], Commit::initial());
        assert_eq!(commits[2].patch_id, "patchId2");

        let replica = EditorService::new();
        assert_eq!(restore(storage.as_ref(), &replica).await.unwrap(), 1);
        assert_eq!(replica.content(&doc).unwrap().content, "Hello\nWorld");
        assert_eq!(replica.content(&doc).unwrap().revision, 2);
    }

    #[tokio::test]
    async fn test_restore_rejects_corrupted_log() {
        let storage = MemoryStorage::new();
        let doc = id("doc:bad");

        storage.create(&doc).await.unwrap();
        storage
            .append(&doc, 1, &Commit::new("p1", vec![Operation::delete_line(3)]))
            .await
            .unwrap();

        let service = EditorService::new();
        assert!(matches!(
            restore(&storage, &service).await,
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_document_stops_persisting_alone() {
        let storage = Arc::new(MemoryStorage::new());
        let stale = id("doc:stale");
        storage.create(&stale).await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = spawn_writer(storage.clone(), rx);
        let service = EditorService::new().with_journal(tx);

        let hello = || {
            Patch::new(
                "p1",
                0,
                vec![Operation::change_line(0, ContentOperation::insert_text(0, "Hello"))],
            )
        };

        // Already in storage, so its creation cannot be persisted
        service.create_document(stale.clone()).unwrap();
        service.apply_patch(&stale, hello()).unwrap();

        let fresh = id("doc:fresh");
        service.create_document(fresh.clone()).unwrap();
        service.apply_patch(&fresh, hello()).unwrap();

        drop(service);
        assert_eq!(writer.await.unwrap(), vec![stale.clone()]);

        assert_eq!(storage.load(&stale).await.unwrap().unwrap().len(), 1);
        assert_eq!(storage.load(&fresh).await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_writer_drains_queue_after_senders_close() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let service = EditorService::new().with_journal(tx);

        let doc = id("doc:1");
        service.create_document(doc.clone()).unwrap();
        for revision in 0..50 {
            service
                .apply_patch(
                    &doc,
                    Patch::new(
                        format!("p{}", revision),
                        revision,
                        vec![Operation::insert_line(0)],
                    ),
                )
                .unwrap();
        }
        drop(service);

        // Everything was queued before the writer started
        let writer = spawn_writer(storage.clone(), rx);
        assert!(writer.await.unwrap().is_empty());
        assert_eq!(storage.load(&doc).await.unwrap().unwrap().len(), 51);
    }
}
