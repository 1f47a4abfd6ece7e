//! Local-first synchronization with the remote diagram table.

mod engine;
mod notifier;

use std::fmt;

use crate::remote::RemoteError;

pub use engine::SyncEngine;
pub use notifier::{ConflictEvent, ConflictNotifier};

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No remote configured; nothing to do.
    LocalOnly,
    /// Another pass was already running.
    Skipped,
    /// The remote failed the accessibility check; no record was touched.
    Aborted(RemoteError),
    Completed(SyncReport),
}

impl SyncOutcome {
    #[must_use]
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Per-pass counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub pushed: usize,
    pub in_sync: usize,
    pub conflicts: usize,
    /// Dirty records skipped because a conflict on them awaits resolution
    pub awaiting: usize,
    /// Dirty records at the retry cap, left for the next full pass
    pub deferred: usize,
    pub failed: usize,
    pub queue_completed: usize,
    pub queue_pending: usize,
    /// Set when a remote failure stopped the pass after it started
    pub interrupted: Option<RemoteError>,
}

impl SyncReport {
    /// Whether the pass did any remote work worth reporting.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.created == 0
            && self.pushed == 0
            && self.in_sync == 0
            && self.conflicts == 0
            && self.failed == 0
            && self.queue_completed == 0
            && self.queue_pending == 0
            && self.interrupted.is_none()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} pushed, {} in sync, {} conflict(s), {} failed, {} queued op(s) done, {} pending",
            self.created,
            self.pushed,
            self.in_sync,
            self.conflicts,
            self.failed,
            self.queue_completed,
            self.queue_pending
        )?;
        if self.awaiting > 0 {
            write!(f, ", {} awaiting resolution", self.awaiting)?;
        }
        if self.deferred > 0 {
            write!(f, ", {} deferred", self.deferred)?;
        }
        if let Some(reason) = &self.interrupted {
            write!(f, " (stopped: {reason})")?;
        }
        Ok(())
    }
}

/// Result of applying a conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Applied,
    /// The resolution could not be written; the record stays dirty and the
    /// regular sync passes pick it up again.
    RetryScheduled(RemoteError),
}
