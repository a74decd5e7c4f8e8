//! SQLite storage backend

use crate::{Storage, StorageError, StorageStats};
use async_trait::async_trait;
use linesync_core::{Commit, DocumentId, Operation};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
///
/// Embedded persistence for single-node setups. One row per commit, keyed by
/// document and revision.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

impl SqliteStorage {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
            );

            CREATE TABLE IF NOT EXISTS commits (
                document_id TEXT NOT NULL REFERENCES documents(id),
                revision INTEGER NOT NULL,
                patch_id TEXT NOT NULL,
                operations BLOB NOT NULL,
                PRIMARY KEY (document_id, revision)
            );
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }
}

fn insert_commit(
    conn: &Connection,
    id: &DocumentId,
    revision: usize,
    commit: &Commit,
) -> Result<(), StorageError> {
    let operations = serde_json::to_vec(&commit.operations)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO commits (document_id, revision, patch_id, operations) VALUES (?1, ?2, ?3, ?4)",
        params![id.as_str(), revision as i64, commit.patch_id, operations],
    )
    .map_err(db_err)?;

    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create(&self, id: &DocumentId) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO documents (id) VALUES (?1)",
                params![id.as_str()],
            )
            .map_err(db_err)?;
        if inserted == 0 {
            return Err(StorageError::AlreadyExists(id.to_string()));
        }

        insert_commit(&tx, id, 0, &Commit::initial())?;
        tx.commit().map_err(db_err)?;

        Ok(())
    }

    async fn append(&self, id: &DocumentId, revision: usize, commit: &Commit) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let next: Option<i64> = tx
            .query_row(
                r#"
                SELECT COUNT(c.revision) FROM documents d
                LEFT JOIN commits c ON c.document_id = d.id
                WHERE d.id = ?1
                GROUP BY d.id
                "#,
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let expected = next.ok_or_else(|| StorageError::NotFound(id.to_string()))? as usize;
        if expected != revision {
            return Err(StorageError::Conflict {
                id: id.to_string(),
                expected,
                got: revision,
            });
        }

        insert_commit(&tx, id, revision, commit)?;
        tx.commit().map_err(db_err)?;

        Ok(())
    }

    async fn load(&self, id: &DocumentId) -> Result<Option<Vec<Commit>>, StorageError> {
        let conn = self.conn.lock();

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if found.is_none() {
            return Ok(None);
        }

        let mut stmt = conn
            .prepare("SELECT patch_id, operations FROM commits WHERE document_id = ?1 ORDER BY revision")
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                let patch_id: String = row.get(0)?;
                let operations: Vec<u8> = row.get(1)?;
                Ok((patch_id, operations))
            })
            .map_err(db_err)?;

        let mut commits = Vec::new();
        for row in rows {
            let (patch_id, operations) = row.map_err(db_err)?;
            let operations: Vec<Operation> = serde_json::from_slice(&operations)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            commits.push(Commit::new(patch_id, operations));
        }

        Ok(Some(commits))
    }

    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError> {
        let conn = self.conn.lock();

        // Translate the glob into a LIKE pattern; `\` escapes LIKE wildcards in IDs
        let like = match pattern {
            Some(p) if p == "*" => None,
            Some(p) => {
                let escaped = p.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
                Some(if let Some(prefix) = escaped.strip_suffix('*') {
                    format!("{}%", prefix)
                } else if let Some(suffix) = escaped.strip_prefix('*') {
                    format!("%{}", suffix)
                } else {
                    escaped
                })
            }
            None => None,
        };

        let mut stmt = conn
            .prepare("SELECT id FROM documents WHERE ?1 IS NULL OR id LIKE ?1 ESCAPE '\\' ORDER BY id")
            .map_err(db_err)?;

        let ids: Vec<DocumentId> = stmt
            .query_map(params![like], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .filter_map(|r| r.ok())
            .filter_map(|id| DocumentId::new(id).ok())
            .collect();

        Ok(ids)
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        let conn = self.conn.lock();

        let document_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(db_err)?;

        let (commit_count, total_size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(patch_id) + LENGTH(operations)), 0) FROM commits",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_err)?;

        Ok(StorageStats {
            document_count: document_count as usize,
            commit_count: commit_count as usize,
            total_size_bytes: total_size as usize,
        })
    }
}
