use std::io;

use medit_core::ai::AiError;
use medit_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] medit_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("No diagram source provided")]
    EmptyContent,
    #[error("Edited diagram source cannot be empty")]
    EmptyEditedContent,
    #[error("Mermaid export needs a diagram id: medit export <id> --format mermaid")]
    MermaidExportNeedsDiagram,
    #[error("Diagram ID cannot be empty")]
    EmptyDiagramId,
    #[error("Diagram not found for id/prefix: {0}")]
    DiagramNotFound(String),
    #[error("{0}")]
    AmbiguousDiagramId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync aborted: {0} ({hint})", hint = .0.hint())]
    SyncAborted(RemoteError),
    #[error(
        "Remote sync is not configured. Run `medit config set --remote-url <URL> --remote-token <TOKEN> --remote-table <ID>` or set MEDIT_REMOTE_URL, MEDIT_REMOTE_TOKEN, and MEDIT_REMOTE_TABLE."
    )]
    SyncNotConfigured,
    #[error(
        "AI generation is not configured. Run `medit config set --ai-url <URL> --ai-key <KEY> --ai-model <MODEL>`."
    )]
    AiNotConfigured,
}
