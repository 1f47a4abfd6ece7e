//! Data models for Mermaid Edit

mod diagram;
mod sync_conflict;
mod sync_op;

pub use diagram::{DiagramId, DiagramRecord, DEFAULT_TITLE, TEMP_ID_PREFIX};
pub use sync_conflict::{Resolution, SyncConflict};
pub use sync_op::{QueuedOp, SyncAction};
