//! Document types: identifiers, commits, patches and immutable snapshots

use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Patch id of the sentinel commit every document starts with
pub const INITIAL_PATCH_ID: &str = "initial";

/// Document identifier - UTF-8 string, max 512 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new document ID, validating the format
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidDocumentId("Document ID cannot be empty".into()));
        }

        if id.len() > 512 {
            return Err(Error::InvalidDocumentId("Document ID exceeds 512 bytes".into()));
        }

        // Validate pattern: [a-zA-Z0-9:_-]+
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_' || c == '-') {
            return Err(Error::InvalidDocumentId(
                "Document ID must match pattern [a-zA-Z0-9:_-]+".into(),
            ));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An accepted, immutable batch of operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub patch_id: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Commit {
    pub fn new(patch_id: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            patch_id: patch_id.into(),
            operations,
        }
    }

    /// The sentinel commit at revision 0
    pub fn initial() -> Self {
        Self::new(INITIAL_PATCH_ID, Vec::new())
    }
}

/// A client-submitted batch of operations, authored against `base_revision`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub id: String,
    pub base_revision: usize,
    pub operations: Vec<Operation>,
}

impl Patch {
    pub fn new(id: impl Into<String>, base_revision: usize, operations: Vec<Operation>) -> Self {
        Self {
            id: id.into(),
            base_revision,
            operations,
        }
    }
}

/// One commit in a history chain, linked to the commit before it
struct Link {
    commit: Commit,
    revision: usize,
    prev: Option<Arc<Link>>,
}

impl Drop for Link {
    // unlink iteratively; long chains would overflow the stack otherwise
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(link) = prev {
            prev = match Arc::try_unwrap(link) {
                Ok(mut link) => link.prev.take(),
                Err(_) => break,
            };
        }
    }
}

/// Persistent commit history.
///
/// Appending shares every earlier commit with the history it extends, so a
/// snapshot never copies the commits of its predecessors.
#[derive(Clone)]
struct History {
    head: Arc<Link>,
}

impl History {
    fn new(first: Commit) -> Self {
        Self {
            head: Arc::new(Link {
                commit: first,
                revision: 0,
                prev: None,
            }),
        }
    }

    fn push(&self, commit: Commit) -> Self {
        Self {
            head: Arc::new(Link {
                commit,
                revision: self.head.revision + 1,
                prev: Some(self.head.clone()),
            }),
        }
    }

    fn revision(&self) -> usize {
        self.head.revision
    }

    fn latest(&self) -> &Commit {
        &self.head.commit
    }

    /// Newest to oldest
    fn iter_rev(&self) -> impl Iterator<Item = &Commit> {
        std::iter::successors(Some(&*self.head), |link| link.prev.as_deref())
            .map(|link| &link.commit)
    }

    /// The newest `count` commits, oldest first
    fn last(&self, count: usize) -> Vec<&Commit> {
        let mut commits: Vec<&Commit> = self.iter_rev().take(count).collect();
        commits.reverse();
        commits
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.head, &other.head)
            || (self.revision() == other.revision() && self.iter_rev().eq(other.iter_rev()))
    }
}

impl Eq for History {}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.last(self.revision() + 1)).finish()
    }
}

/// An immutable document snapshot.
///
/// `content` is always the fold of every commit's operations, in order,
/// starting from the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    history: History,
    content: String,
}

impl Document {
    /// A fresh document: only the sentinel commit, empty content
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            history: History::new(Commit::initial()),
            content: String::new(),
        }
    }

    /// Rebuild a document from a full commit log, sentinel included
    pub fn from_commits(id: DocumentId, commits: Vec<Commit>) -> Result<Self> {
        let mut commits = commits.into_iter();
        let first = commits.next().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "commit log of {} is missing the initial commit",
                id
            ))
        })?;

        let mut content = text::apply_operations("", &first.operations)?;
        let mut history = History::new(first);
        for commit in commits {
            content = text::apply_operations(&content, &commit.operations)?;
            history = history.push(commit);
        }

        Ok(Self {
            id,
            history,
            content,
        })
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Full history, sentinel first
    pub fn commits(&self) -> Vec<&Commit> {
        self.history.last(self.revision() + 1)
    }

    /// The most recent commit
    pub fn latest(&self) -> &Commit {
        self.history.latest()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Current revision: commit count minus one
    pub fn revision(&self) -> usize {
        self.history.revision()
    }

    /// Commits strictly after `revision`, oldest first
    pub fn commits_since(&self, revision: usize) -> Result<Vec<&Commit>> {
        if revision > self.revision() {
            return Err(Error::InvalidRevision {
                revision,
                current: self.revision(),
            });
        }
        Ok(self.history.last(self.revision() - revision))
    }

    /// A new snapshot with `commit` appended and `content` installed.
    ///
    /// Shares all earlier history with `self`.
    pub fn with_commit(&self, commit: Commit, content: String) -> Self {
        Self {
            id: self.id.clone(),
            history: self.history.push(commit),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ContentOperation;

    #[test]
    fn test_document_id_valid() {
        assert!(DocumentId::new("notes:123").is_ok());
        assert!(DocumentId::new("draft_items-456").is_ok());
    }

    #[test]
    fn test_document_id_invalid() {
        assert!(DocumentId::new("").is_err());
        assert!(DocumentId::new("notes/123").is_err()); // invalid char
        assert!(DocumentId::new("a".repeat(513)).is_err()); // too long
    }

    #[test]
    fn test_new_document_is_revision_zero() {
        let doc = Document::new(DocumentId::new("doc:1").unwrap());

        assert_eq!(doc.revision(), 0);
        assert_eq!(doc.content(), "");
        assert_eq!(doc.commits(), vec![&Commit::initial()]);
        assert_eq!(doc.latest(), &Commit::initial());
    }

    #[test]
    fn test_commits_since() {
        let doc = Document::new(DocumentId::new("doc:2").unwrap())
            .with_commit(Commit::new("a", vec![Operation::insert_line(1)]), "\n".into())
            .with_commit(Commit::new("b", vec![Operation::delete_line(1)]), "".into());

        assert_eq!(doc.revision(), 2);
        assert_eq!(doc.commits_since(0).unwrap().len(), 2);
        assert_eq!(doc.commits_since(1).unwrap()[0].patch_id, "b");
        assert!(doc.commits_since(2).unwrap().is_empty());
        assert_eq!(
            doc.commits_since(3),
            Err(Error::InvalidRevision { revision: 3, current: 2 })
        );
    }

    #[test]
    fn test_from_commits_folds_content() {
        let commits = vec![
            Commit::initial(),
            Commit::new(
                "p1",
                vec![
                    Operation::change_line(0, ContentOperation::insert_text(0, "Hello")),
                    Operation::insert_line(1),
                    Operation::change_line(1, ContentOperation::insert_text(0, "World")),
                ],
            ),
        ];

        let doc = Document::from_commits(DocumentId::new("doc:3").unwrap(), commits).unwrap();
        assert_eq!(doc.content(), "Hello\nWorld");
        assert_eq!(doc.revision(), 1);
    }

    #[test]
    fn test_from_commits_requires_sentinel() {
        let result = Document::from_commits(DocumentId::new("doc:4").unwrap(), Vec::new());
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_patch_json() {
        let patch: Patch = serde_json::from_str(
            r#"{"id": "p1", "baseRevision": 3, "operations": [{"type": "insert-line", "lineIndex": 0}]}"#,
        )
        .unwrap();

        assert_eq!(patch, Patch::new("p1", 3, vec![Operation::insert_line(0)]));
    }

    #[test]
    fn test_snapshots_share_history() {
        let base = Document::new(DocumentId::new("doc:5").unwrap())
            .with_commit(Commit::new("a", vec![Operation::insert_line(1)]), "\n".into());
        let left = base.with_commit(Commit::new("b", vec![Operation::delete_line(1)]), "".into());
        let right = base.with_commit(Commit::new("c", vec![Operation::insert_line(0)]), "\n\n".into());

        assert_eq!(base.revision(), 1);
        assert_eq!(base.latest().patch_id, "a");
        assert_eq!(left.commits_since(1).unwrap()[0].patch_id, "b");
        assert_eq!(right.commits_since(1).unwrap()[0].patch_id, "c");
        assert_ne!(left, right);
        assert_eq!(
            right.commits().iter().map(|c| c.patch_id.as_str()).collect::<Vec<_>>(),
            vec![INITIAL_PATCH_ID, "a", "c"]
        );
    }

    #[test]
    fn test_long_history() {
        let mut doc = Document::new(DocumentId::new("doc:6").unwrap());
        for i in 0..200_000 {
            doc = doc.with_commit(Commit::new(format!("p{}", i), Vec::new()), String::new());
        }

        assert_eq!(doc.revision(), 200_000);
        assert_eq!(doc.commits_since(199_998).unwrap().len(), 2);
        assert_eq!(doc.latest().patch_id, "p199999");
        drop(doc);
    }
}
