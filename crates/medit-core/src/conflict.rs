//! Conflict detection between a local record and its remote counterpart.

use std::fmt;

use crate::models::DiagramRecord;

/// What the sync engine should do with one dirty record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// No remote counterpart: create it.
    Create,
    /// Local is strictly newer: overwrite the remote.
    Push,
    /// Remote is strictly newer: leave both sides alone and ask the user.
    Conflict,
    /// Same `updated_at` on both sides.
    InSync,
}

impl SyncDecision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Push => "push",
            Self::Conflict => "conflict",
            Self::InSync => "in-sync",
        }
    }
}

impl fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare `updated_at` only; content is never inspected.
#[must_use]
pub fn decide(local: &DiagramRecord, remote: Option<&DiagramRecord>) -> SyncDecision {
    let Some(remote) = remote else {
        return SyncDecision::Create;
    };
    match local.updated_at.cmp(&remote.updated_at) {
        std::cmp::Ordering::Greater => SyncDecision::Push,
        std::cmp::Ordering::Less => SyncDecision::Conflict,
        std::cmp::Ordering::Equal => SyncDecision::InSync,
    }
}
