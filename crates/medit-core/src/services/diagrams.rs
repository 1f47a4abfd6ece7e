//! Editing operations over the local store.

use crate::clock::Clock;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{DiagramId, DiagramRecord, SyncAction, DEFAULT_TITLE};

/// Starter content for the diagram created on first launch.
pub const DEFAULT_CONTENT: &str = "graph TD\n    A[Start] --> B[End]";

/// The only writer of `title`, `content`, and `updated_at`.
///
/// Every mutation marks the record dirty with a strictly larger `updated_at`;
/// the sync engine picks it up on its next sweep.
#[derive(Clone)]
pub struct DiagramService<L, C> {
    store: L,
    clock: C,
}

impl<L: LocalStore, C: Clock> DiagramService<L, C> {
    pub const fn new(store: L, clock: C) -> Self {
        Self { store, clock }
    }

    pub const fn store(&self) -> &L {
        &self.store
    }

    /// Create a new diagram with a temporary id.
    pub async fn create(&self, title: &str, content: &str) -> Result<DiagramRecord> {
        let record = DiagramRecord::new(title.trim(), content, self.clock.now_ms());
        self.store.put(&record).await?;
        tracing::debug!("Created diagram {}", record.id);
        Ok(record)
    }

    /// Get a diagram, following a temporary id that sync already replaced.
    pub async fn get(&self, id: &DiagramId) -> Result<Option<DiagramRecord>> {
        let id = self.store.resolve_id(id).await?;
        self.store.get(&id).await
    }

    /// Get a diagram, or `Error::NotFound`.
    pub async fn require(&self, id: &DiagramId) -> Result<DiagramRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// All diagrams, newest first.
    pub async fn list(&self) -> Result<Vec<DiagramRecord>> {
        let mut diagrams = self.store.get_all().await?;
        diagrams.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(diagrams)
    }

    /// Replace the diagram source. Unchanged content is not an edit.
    pub async fn update_content(&self, id: &DiagramId, content: &str) -> Result<DiagramRecord> {
        let current = self.require(id).await?;
        if current.content == content {
            return Ok(current);
        }
        self.edit(&current.id, None, Some(content)).await
    }

    /// Change the title; a blank title falls back to the default.
    pub async fn rename(&self, id: &DiagramId, title: &str) -> Result<DiagramRecord> {
        let current = self.require(id).await?;
        let title = match title.trim() {
            "" => DEFAULT_TITLE,
            title => title,
        };
        if current.title == title {
            return Ok(current);
        }
        self.edit(&current.id, Some(title), None).await
    }

    // The id may be migrated by a sync pass after `require`; the store
    // follows it rather than writing the old id back.
    async fn edit(
        &self,
        id: &DiagramId,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<DiagramRecord> {
        self.store
            .update_fields(id, title, content, self.clock.now_ms())
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Delete locally and queue the remote delete.
    ///
    /// Returns whether the diagram existed. Temporary ids never reached the
    /// remote, so nothing is queued for them.
    pub async fn delete(&self, id: &DiagramId) -> Result<bool> {
        let Some(removed) = self.store.delete(id).await? else {
            return Ok(false);
        };

        if !removed.is_temporary() {
            self.store
                .enqueue_op(&removed, SyncAction::Delete, self.clock.now_ms())
                .await?;
        }
        tracing::debug!("Deleted diagram {}", removed);
        Ok(true)
    }

    /// Create the starter diagram when the store is empty.
    pub async fn ensure_default(&self) -> Result<Option<DiagramRecord>> {
        if !self.store.get_all().await?.is_empty() {
            return Ok(None);
        }
        self.create(DEFAULT_TITLE, DEFAULT_CONTENT).await.map(Some)
    }
}
