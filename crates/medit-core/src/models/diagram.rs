//! Diagram model

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix marking ids generated on this device before the remote assigned one.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Title given to diagrams created without one.
pub const DEFAULT_TITLE: &str = "Untitled Diagram";

/// Opaque diagram identifier.
///
/// Local ids are `tmp-<uuid v7>` until the first successful remote create
/// replaces them with the canonical id issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramId(String);

impl DiagramId {
    /// Create a new temporary id using UUID v7 (time-sortable)
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap an id issued by the remote store
    #[must_use]
    pub fn canonical(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether this id was generated locally and not yet confirmed remotely
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DiagramId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

/// A Mermaid diagram as persisted locally and synced remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramRecord {
    /// Unique identifier
    pub id: DiagramId,
    /// Human label
    pub title: String,
    /// Mermaid source text
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation timestamp (Unix ms), the only conflict signal
    pub updated_at: i64,
    /// Local changes not yet confirmed on the remote
    pub dirty: bool,
    /// Failed remote write attempts since the last successful sync
    pub retry_count: u32,
}

impl DiagramRecord {
    /// Create a new dirty diagram with a temporary id
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>, now_ms: i64) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title
        };
        Self {
            id: DiagramId::temporary(),
            title,
            content: content.into(),
            created_at: now_ms,
            updated_at: now_ms,
            dirty: true,
            retry_count: 0,
        }
    }

    /// Mark a local mutation: `updated_at` always moves forward, even when the
    /// clock did not.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms.max(self.updated_at.saturating_add(1));
        self.dirty = true;
    }

    /// First line of the content, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }

    /// Check if diagram content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_ids_are_unique_and_prefixed() {
        let id1 = DiagramId::temporary();
        let id2 = DiagramId::temporary();
        assert_ne!(id1, id2);
        assert!(id1.is_temporary());
        assert!(id1.as_str().starts_with(TEMP_ID_PREFIX));
    }

    #[test]
    fn canonical_ids_are_not_temporary() {
        assert!(!DiagramId::canonical("42").is_temporary());
        let parsed: DiagramId = " 17 ".parse().unwrap();
        assert_eq!(parsed.as_str(), "17");
    }

    #[test]
    fn new_record_is_dirty_with_equal_timestamps() {
        let record = DiagramRecord::new("Flow", "graph TD; A-->B", 1_000);
        assert!(record.dirty);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.id.is_temporary());
    }

    #[test]
    fn blank_title_defaults() {
        let record = DiagramRecord::new("  ", "", 1);
        assert_eq!(record.title, DEFAULT_TITLE);
        assert!(record.is_empty());
    }

    #[test]
    fn touch_is_strictly_increasing_even_with_stalled_clock() {
        let mut record = DiagramRecord::new("Flow", "", 1_000);
        record.dirty = false;

        record.touch(1_000);
        assert_eq!(record.updated_at, 1_001);
        assert!(record.dirty);

        record.touch(900);
        assert_eq!(record.updated_at, 1_002);

        record.touch(5_000);
        assert_eq!(record.updated_at, 5_000);
    }

    #[test]
    fn preview_skips_blank_lines() {
        let record = DiagramRecord::new("Flow", "\n  graph TD\n  A-->B", 1);
        assert_eq!(record.preview(50), "graph TD");
        assert_eq!(record.preview(5), "graph");
    }
}
