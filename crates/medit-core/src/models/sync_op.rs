//! Offline operation queue entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DiagramId;

/// Remote action deferred while offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Save,
    Delete,
}

impl SyncAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "save" => Ok(Self::Save),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown sync action '{other}'")),
        }
    }
}

/// A queued remote operation, removed once it succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOp {
    /// Queue position (monotonic)
    pub id: i64,
    /// Diagram the action applies to
    pub record_id: DiagramId,
    pub action: SyncAction,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
}
