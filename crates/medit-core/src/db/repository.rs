//! Local diagram store backed by libSQL

use std::path::Path;
use std::sync::Arc;

use libsql::{params, Connection, Row, Value};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{DiagramId, DiagramRecord, QueuedOp, Resolution, SyncAction, SyncConflict};

use super::Database;

const DIAGRAM_COLUMNS: &str =
    "id, title, content, created_at, updated_at, dirty, retry_count";
const CONFLICT_COLUMNS: &str =
    "id, diagram_id, local_updated_at, remote_updated_at, detected_at, resolved_at, resolution";

/// Durable on-device storage for diagrams, the offline queue, and the conflict log.
///
/// Every write either succeeds or returns an error; nothing is dropped silently.
pub trait LocalStore: Clone {
    /// Insert or replace a record by id.
    ///
    /// A temporary id that was already migrated writes to its canonical record
    /// instead of recreating the temporary row.
    async fn put(&self, record: &DiagramRecord) -> Result<()>;

    /// Get a record by id, `None` when absent
    async fn get(&self, id: &DiagramId) -> Result<Option<DiagramRecord>>;

    /// Every stored record, in no particular order
    async fn get_all(&self) -> Result<Vec<DiagramRecord>>;

    /// Records with unconfirmed local changes
    async fn list_dirty(&self) -> Result<Vec<DiagramRecord>>;

    /// Follow a migrated temporary id to its canonical id; any other id maps
    /// to itself
    async fn resolve_id(&self, id: &DiagramId) -> Result<DiagramId>;

    /// Apply a local edit in place and mark the record dirty.
    ///
    /// `None` fields are left unchanged. `updated_at` becomes
    /// `max(now_ms, updated_at + 1)`. Migrated temporary ids are followed.
    /// Returns `None` when no record matches, never inserting one.
    async fn update_fields(
        &self,
        id: &DiagramId,
        title: Option<&str>,
        content: Option<&str>,
        now_ms: i64,
    ) -> Result<Option<DiagramRecord>>;

    /// Remove a record, following a migrated temporary id. Returns the id of
    /// the removed row, `None` when nothing matched (not an error).
    async fn delete(&self, id: &DiagramId) -> Result<Option<DiagramId>>;

    /// Move a record from a temporary id to its canonical id in one transaction.
    ///
    /// The migrated row is clean only when its `updated_at` still equals
    /// `pushed_updated_at`; otherwise it stays dirty under the new id. Returns
    /// `None` when the old record no longer exists.
    async fn replace_id(
        &self,
        old_id: &DiagramId,
        new_id: &DiagramId,
        pushed_updated_at: i64,
    ) -> Result<Option<DiagramRecord>>;

    /// Clear `dirty` and reset `retry_count` if the stored `updated_at` still
    /// matches what was pushed. Returns whether the record was cleared.
    async fn mark_synced(&self, id: &DiagramId, pushed_updated_at: i64) -> Result<bool>;

    /// Count a failed remote write, saturating at `cap`. Returns the new count.
    async fn record_failure(&self, id: &DiagramId, cap: u32) -> Result<u32>;

    /// Append an operation to the offline queue
    async fn enqueue_op(
        &self,
        record_id: &DiagramId,
        action: SyncAction,
        now_ms: i64,
    ) -> Result<QueuedOp>;

    /// Queued operations, oldest first
    async fn pending_ops(&self) -> Result<Vec<QueuedOp>>;

    /// Remove one queued operation
    async fn remove_op(&self, op_id: i64) -> Result<()>;

    /// Log a newly detected conflict
    async fn record_conflict(
        &self,
        diagram_id: &DiagramId,
        local_updated_at: i64,
        remote_updated_at: i64,
        detected_at: i64,
    ) -> Result<SyncConflict>;

    /// Close every open conflict for a diagram
    async fn resolve_conflicts(
        &self,
        diagram_id: &DiagramId,
        resolution: Resolution,
        resolved_at: i64,
    ) -> Result<()>;

    /// Logged conflicts, newest first
    async fn list_conflicts(&self, open_only: bool, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `LocalStore`.
///
/// Clones share one connection; the mutex serializes statements so that the
/// multi-statement operations below run as uninterrupted transactions.
#[derive(Clone)]
pub struct LibSqlDiagramStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlDiagramStore {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (or create) the store at the given filesystem path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    fn parse_diagram(row: &Row) -> Result<DiagramRecord> {
        let id: String = row.get(0)?;
        let retry_count: i64 = row.get(6)?;
        Ok(DiagramRecord {
            id: DiagramId::canonical(id),
            title: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            dirty: row.get::<i64>(5)? != 0,
            retry_count: u32::try_from(retry_count).unwrap_or_default(),
        })
    }

    fn parse_op(row: &Row) -> Result<QueuedOp> {
        let record_id: String = row.get(1)?;
        let action: String = row.get(2)?;
        Ok(QueuedOp {
            id: row.get(0)?,
            record_id: DiagramId::canonical(record_id),
            action: action.parse().map_err(Error::Database)?,
            enqueued_at: row.get(3)?,
        })
    }

    fn parse_conflict(row: &Row) -> Result<SyncConflict> {
        let diagram_id: String = row.get(1)?;
        let resolved_at = match row.get_value(5)? {
            Value::Integer(value) => Some(value),
            _ => None,
        };
        let resolution = match row.get_value(6)? {
            Value::Text(value) => Some(value.parse().map_err(Error::Database)?),
            _ => None,
        };
        Ok(SyncConflict {
            id: row.get(0)?,
            diagram_id: DiagramId::canonical(diagram_id),
            local_updated_at: row.get(2)?,
            remote_updated_at: row.get(3)?,
            detected_at: row.get(4)?,
            resolved_at,
            resolution,
        })
    }

    async fn query_diagrams(
        conn: &Connection,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<DiagramRecord>> {
        let mut rows = conn.query(sql, params).await?;
        let mut diagrams = Vec::new();
        while let Some(row) = rows.next().await? {
            diagrams.push(Self::parse_diagram(&row)?);
        }
        Ok(diagrams)
    }

    async fn fetch_diagram(conn: &Connection, id: &str) -> Result<Option<DiagramRecord>> {
        let mut rows = conn
            .query(
                &format!("SELECT {DIAGRAM_COLUMNS} FROM diagrams WHERE id = ?1"),
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_diagram(&row)?)),
            None => Ok(None),
        }
    }

    async fn canonical_id(conn: &Connection, id: &str) -> Result<String> {
        let mut rows = conn
            .query(
                "SELECT new_id FROM id_aliases WHERE old_id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(id.to_string()),
        }
    }

    async fn migrate_id_statements(
        conn: &Connection,
        old_id: &str,
        new_id: &str,
        pushed_updated_at: i64,
    ) -> Result<u64> {
        let inserted = conn
            .execute(
                "INSERT OR REPLACE INTO diagrams
                    (id, title, content, created_at, updated_at, dirty, retry_count)
                 SELECT ?1, title, content, created_at, updated_at,
                        CASE WHEN updated_at = ?3 THEN 0 ELSE 1 END,
                        CASE WHEN updated_at = ?3 THEN 0 ELSE retry_count END
                 FROM diagrams WHERE id = ?2",
                params![new_id, old_id, pushed_updated_at],
            )
            .await?;
        if inserted == 0 {
            return Ok(0);
        }
        conn.execute("DELETE FROM diagrams WHERE id = ?1", params![old_id])
            .await?;
        conn.execute(
            "INSERT OR REPLACE INTO id_aliases (old_id, new_id) VALUES (?1, ?2)",
            params![old_id, new_id],
        )
        .await?;
        conn.execute(
            "UPDATE sync_queue SET record_id = ?1 WHERE record_id = ?2",
            params![new_id, old_id],
        )
        .await?;
        conn.execute(
            "UPDATE sync_conflicts SET diagram_id = ?1 WHERE diagram_id = ?2",
            params![new_id, old_id],
        )
        .await?;
        Ok(inserted)
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

impl LocalStore for LibSqlDiagramStore {
    async fn put(&self, record: &DiagramRecord) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let id = Self::canonical_id(conn, record.id.as_str()).await?;
        conn.execute(
                "INSERT INTO diagrams (id, title, content, created_at, updated_at, dirty, retry_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    dirty = excluded.dirty,
                    retry_count = excluded.retry_count",
                params![
                    id,
                    record.title.as_str(),
                    record.content.as_str(),
                    record.created_at,
                    record.updated_at,
                    i64::from(record.dirty),
                    i64::from(record.retry_count)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &DiagramId) -> Result<Option<DiagramRecord>> {
        let db = self.db.lock().await;
        Self::fetch_diagram(db.connection(), id.as_str()).await
    }

    async fn get_all(&self) -> Result<Vec<DiagramRecord>> {
        let db = self.db.lock().await;
        Self::query_diagrams(
            db.connection(),
            &format!("SELECT {DIAGRAM_COLUMNS} FROM diagrams"),
            (),
        )
        .await
    }

    async fn list_dirty(&self) -> Result<Vec<DiagramRecord>> {
        let db = self.db.lock().await;
        Self::query_diagrams(
            db.connection(),
            &format!("SELECT {DIAGRAM_COLUMNS} FROM diagrams WHERE dirty = 1 ORDER BY updated_at ASC"),
            (),
        )
        .await
    }

    async fn resolve_id(&self, id: &DiagramId) -> Result<DiagramId> {
        let db = self.db.lock().await;
        Self::canonical_id(db.connection(), id.as_str())
            .await
            .map(DiagramId::canonical)
    }

    async fn update_fields(
        &self,
        id: &DiagramId,
        title: Option<&str>,
        content: Option<&str>,
        now_ms: i64,
    ) -> Result<Option<DiagramRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let id = Self::canonical_id(conn, id.as_str()).await?;

        let updated = conn
            .execute(
                "UPDATE diagrams SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    updated_at = MAX(?4, updated_at + 1),
                    dirty = 1
                 WHERE id = ?1",
                params![id.as_str(), optional_text(title), optional_text(content), now_ms],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        Self::fetch_diagram(conn, &id).await
    }

    async fn delete(&self, id: &DiagramId) -> Result<Option<DiagramId>> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let id = Self::canonical_id(conn, id.as_str()).await?;

        let removed = conn
            .execute("DELETE FROM diagrams WHERE id = ?1", params![id.as_str()])
            .await?;
        Ok((removed > 0).then(|| DiagramId::canonical(id)))
    }

    async fn replace_id(
        &self,
        old_id: &DiagramId,
        new_id: &DiagramId,
        pushed_updated_at: i64,
    ) -> Result<Option<DiagramRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let migrated = match Self::migrate_id_statements(
            conn,
            old_id.as_str(),
            new_id.as_str(),
            pushed_updated_at,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        };
        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        if migrated == 0 {
            return Ok(None);
        }
        tracing::debug!("Migrated diagram {} to canonical id {}", old_id, new_id);
        Self::fetch_diagram(conn, new_id.as_str()).await
    }

    async fn mark_synced(&self, id: &DiagramId, pushed_updated_at: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .execute(
                "UPDATE diagrams SET dirty = 0, retry_count = 0 WHERE id = ?1 AND updated_at = ?2",
                params![id.as_str(), pushed_updated_at],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn record_failure(&self, id: &DiagramId, cap: u32) -> Result<u32> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "UPDATE diagrams SET dirty = 1, retry_count = MIN(retry_count + 1, ?2) WHERE id = ?1",
            params![id.as_str(), i64::from(cap)],
        )
        .await?;

        let record = Self::fetch_diagram(conn, id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(record.retry_count)
    }

    async fn enqueue_op(
        &self,
        record_id: &DiagramId,
        action: SyncAction,
        now_ms: i64,
    ) -> Result<QueuedOp> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO sync_queue (record_id, action, enqueued_at) VALUES (?1, ?2, ?3)",
            params![record_id.as_str(), action.as_str(), now_ms],
        )
        .await?;

        Ok(QueuedOp {
            id: conn.last_insert_rowid(),
            record_id: record_id.clone(),
            action,
            enqueued_at: now_ms,
        })
    }

    async fn pending_ops(&self) -> Result<Vec<QueuedOp>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, record_id, action, enqueued_at FROM sync_queue ORDER BY id ASC",
                (),
            )
            .await?;

        let mut ops = Vec::new();
        while let Some(row) = rows.next().await? {
            ops.push(Self::parse_op(&row)?);
        }
        Ok(ops)
    }

    async fn remove_op(&self, op_id: i64) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![op_id])
            .await?;
        Ok(())
    }

    async fn record_conflict(
        &self,
        diagram_id: &DiagramId,
        local_updated_at: i64,
        remote_updated_at: i64,
        detected_at: i64,
    ) -> Result<SyncConflict> {
        let db = self.db.lock().await;
        let conn = db.connection();

        // One open entry per diagram: a re-detected conflict refreshes it.
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts
                     WHERE diagram_id = ?1 AND resolved_at IS NULL
                     ORDER BY id DESC LIMIT 1"
                ),
                params![diagram_id.as_str()],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            let existing = Self::parse_conflict(&row)?;
            conn.execute(
                "UPDATE sync_conflicts SET local_updated_at = ?1, remote_updated_at = ?2
                 WHERE id = ?3",
                params![local_updated_at, remote_updated_at, existing.id],
            )
            .await?;
            return Ok(SyncConflict {
                local_updated_at,
                remote_updated_at,
                ..existing
            });
        }

        conn.execute(
            "INSERT INTO sync_conflicts
                (diagram_id, local_updated_at, remote_updated_at, detected_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                diagram_id.as_str(),
                local_updated_at,
                remote_updated_at,
                detected_at
            ],
        )
        .await?;

        Ok(SyncConflict {
            id: conn.last_insert_rowid(),
            diagram_id: diagram_id.clone(),
            local_updated_at,
            remote_updated_at,
            detected_at,
            resolved_at: None,
            resolution: None,
        })
    }

    async fn resolve_conflicts(
        &self,
        diagram_id: &DiagramId,
        resolution: Resolution,
        resolved_at: i64,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "UPDATE sync_conflicts SET resolved_at = ?1, resolution = ?2
                 WHERE diagram_id = ?3 AND resolved_at IS NULL",
                params![resolved_at, resolution.as_str(), diagram_id.as_str()],
            )
            .await?;
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
    async fn list_conflicts(&self, open_only: bool, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let filter = if open_only {
            "WHERE resolved_at IS NULL"
        } else {
            ""
        };
        let mut rows = db
            .connection()
            .query(
                &format!(
                    "SELECT {CONFLICT_COLUMNS} FROM sync_conflicts {filter}
                     ORDER BY detected_at DESC, id DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(Self::parse_conflict(&row)?);
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> LibSqlDiagramStore {
        LibSqlDiagramStore::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "graph TD; A-->B", 1_000);

        store.put(&record).await.unwrap();

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_upserts() {
        let store = setup().await;
        let mut record = DiagramRecord::new("Flow", "graph TD", 1_000);
        store.put(&record).await.unwrap();

        record.content = "graph LR".to_string();
        record.touch(2_000);
        store.put(&record).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "graph LR");
        assert_eq!(all[0].updated_at, 2_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_is_none() {
        let store = setup().await;
        let missing = store.get(&DiagramId::canonical("404")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "", 1);
        store.put(&record).await.unwrap();

        assert_eq!(store.delete(&record.id).await.unwrap(), Some(record.id.clone()));
        assert_eq!(store.delete(&record.id).await.unwrap(), None);
        assert!(store.get(&record.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_fields_edits_in_place() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "graph TD", 1_000);
        store.put(&record).await.unwrap();
        store.mark_synced(&record.id, 1_000).await.unwrap();

        // A clock behind the stored timestamp still moves updated_at forward.
        let updated = store
            .update_fields(&record.id, None, Some("graph LR"), 500)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Flow");
        assert_eq!(updated.content, "graph LR");
        assert_eq!(updated.updated_at, 1_001);
        assert!(updated.dirty);

        let renamed = store
            .update_fields(&record.id, Some("Renamed"), None, 2_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.title, "Renamed");
        assert_eq!(renamed.content, "graph LR");
        assert_eq!(renamed.updated_at, 2_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_fields_never_inserts() {
        let store = setup().await;
        let missing = store
            .update_fields(&DiagramId::canonical("404"), Some("x"), Some("y"), 1)
            .await
            .unwrap();
        assert!(missing.is_none());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrated_temporary_id_is_followed() {
        let store = setup().await;
        let stale = DiagramRecord::new("Flow", "graph TD", 1_000);
        store.put(&stale).await.unwrap();
        let canonical = DiagramId::canonical("42");
        store.replace_id(&stale.id, &canonical, 1_000).await.unwrap();

        assert_eq!(store.resolve_id(&stale.id).await.unwrap(), canonical);
        assert_eq!(store.resolve_id(&canonical).await.unwrap(), canonical);

        let edited = store
            .update_fields(&stale.id, None, Some("graph LR"), 2_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.id, canonical);

        // A full write under the old id lands on the canonical row too.
        let mut rewritten = stale.clone();
        rewritten.title = "Rewritten".to_string();
        rewritten.touch(3_000);
        store.put(&rewritten).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, canonical);
        assert_eq!(all[0].title, "Rewritten");
        assert!(all[0].dirty);

        assert_eq!(store.delete(&stale.id).await.unwrap(), Some(canonical));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_dirty_excludes_clean_records() {
        let store = setup().await;
        let dirty = DiagramRecord::new("Dirty", "", 1);
        let mut clean = DiagramRecord::new("Clean", "", 2);
        clean.dirty = false;
        store.put(&dirty).await.unwrap();
        store.put(&clean).await.unwrap();

        let listed = store.list_dirty().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, dirty.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_respects_stale_write_guard() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "", 1_000);
        store.put(&record).await.unwrap();

        assert!(!store.mark_synced(&record.id, 999).await.unwrap());
        assert!(store.get(&record.id).await.unwrap().unwrap().dirty);

        assert!(store.mark_synced(&record.id, 1_000).await.unwrap());
        let synced = store.get(&record.id).await.unwrap().unwrap();
        assert!(!synced.dirty);
        assert_eq!(synced.retry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_failure_saturates_at_cap() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "", 1);
        store.put(&record).await.unwrap();

        assert_eq!(store.record_failure(&record.id, 3).await.unwrap(), 1);
        assert_eq!(store.record_failure(&record.id, 3).await.unwrap(), 2);
        assert_eq!(store.record_failure(&record.id, 3).await.unwrap(), 3);
        assert_eq!(store.record_failure(&record.id, 3).await.unwrap(), 3);

        let stored = store.get(&record.id).await.unwrap().unwrap();
        assert!(stored.dirty);
        assert_eq!(stored.retry_count, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_failure_on_missing_record_errors() {
        let store = setup().await;
        let result = store.record_failure(&DiagramId::canonical("gone"), 3).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_id_moves_record_queue_and_conflicts() {
        let store = setup().await;
        let record = DiagramRecord::new("Flow", "graph TD", 1_000);
        store.put(&record).await.unwrap();
        store
            .enqueue_op(&record.id, SyncAction::Save, 1_000)
            .await
            .unwrap();
        store
            .record_conflict(&record.id, 1_000, 2_000, 3_000)
            .await
            .unwrap();

        let canonical = DiagramId::canonical("42");
        let migrated = store
            .replace_id(&record.id, &canonical, 1_000)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(migrated.id, canonical);
        assert!(!migrated.dirty);
        assert_eq!(migrated.content, "graph TD");
        assert!(store.get(&record.id).await.unwrap().is_none());
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        let ops = store.pending_ops().await.unwrap();
        assert_eq!(ops[0].record_id, canonical);
        let conflicts = store.list_conflicts(false, 10).await.unwrap();
        assert_eq!(conflicts[0].diagram_id, canonical);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_id_keeps_newer_edit_dirty() {
        let store = setup().await;
        let mut record = DiagramRecord::new("Flow", "graph TD", 1_000);
        store.put(&record).await.unwrap();

        record.content = "graph LR".to_string();
        record.touch(1_500);
        store.put(&record).await.unwrap();

        let migrated = store
            .replace_id(&record.id, &DiagramId::canonical("7"), 1_000)
            .await
            .unwrap()
            .unwrap();
        assert!(migrated.dirty);
        assert_eq!(migrated.content, "graph LR");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_id_of_missing_record_is_none() {
        let store = setup().await;
        let migrated = store
            .replace_id(&DiagramId::temporary(), &DiagramId::canonical("7"), 1)
            .await
            .unwrap();
        assert!(migrated.is_none());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_is_fifo_and_removable() {
        let store = setup().await;
        let first = DiagramId::canonical("1");
        let second = DiagramId::canonical("2");

        let op1 = store.enqueue_op(&first, SyncAction::Save, 10).await.unwrap();
        let op2 = store
            .enqueue_op(&second, SyncAction::Delete, 20)
            .await
            .unwrap();

        let ops = store.pending_ops().await.unwrap();
        assert_eq!(ops, vec![op1.clone(), op2.clone()]);

        store.remove_op(op1.id).await.unwrap();
        let ops = store.pending_ops().await.unwrap();
        assert_eq!(ops, vec![op2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflict_log_open_and_resolved() {
        let store = setup().await;
        let id = DiagramId::canonical("9");
        store.record_conflict(&id, 100, 200, 300).await.unwrap();

        let open = store.list_conflicts(true, 10).await.unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].is_open());

        store
            .resolve_conflicts(&id, Resolution::Cloud, 400)
            .await
            .unwrap();

        assert!(store.list_conflicts(true, 10).await.unwrap().is_empty());
        let all = store.list_conflicts(false, 10).await.unwrap();
        assert_eq!(all[0].resolved_at, Some(400));
        assert_eq!(all[0].resolution, Some(Resolution::Cloud));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_redetected_conflict_refreshes_open_entry() {
        let store = setup().await;
        let id = DiagramId::canonical("9");
        let first = store.record_conflict(&id, 100, 200, 300).await.unwrap();
        let second = store.record_conflict(&id, 150, 250, 500).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.detected_at, 300);
        let open = store.list_conflicts(true, 10).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].remote_updated_at, 250);
    }
}
