use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use medit_core::clock::SystemClock;
use medit_core::config::AppConfig;
use medit_core::db::LibSqlDiagramStore;
use medit_core::models::SyncConflict;
use medit_core::remote::HttpRecordClient;
use medit_core::services::DiagramService;
use medit_core::sync::SyncEngine;
use medit_core::{DiagramId, DiagramRecord};
use serde::Serialize;

use crate::error::CliError;

pub type Service = DiagramService<LibSqlDiagramStore, SystemClock>;
pub type Engine = SyncEngine<LibSqlDiagramStore, HttpRecordClient, SystemClock>;

const SHORT_ID_LEN: usize = 13;

/// Paths every command needs, resolved once in `main`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct DiagramListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub dirty: bool,
    pub retry_count: u32,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: i64,
    pub diagram_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub detected_at: i64,
    pub detected_at_iso: String,
    pub resolved_at: Option<i64>,
    pub resolution: Option<String>,
}

pub async fn open_store(db_path: &Path) -> Result<LibSqlDiagramStore, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(LibSqlDiagramStore::open(db_path).await?)
}

pub async fn open_service(db_path: &Path) -> Result<Service, CliError> {
    Ok(DiagramService::new(open_store(db_path).await?, SystemClock))
}

/// Effective configuration: the config file, then `MEDIT_*` environment overrides.
pub fn load_config(config_path: &Path) -> Result<AppConfig, CliError> {
    Ok(AppConfig::load_from_path(config_path)?.with_env_overrides())
}

/// Build the remote client, or `None` for local-only mode.
///
/// A half-filled remote section is reported and treated as local-only so that
/// local commands keep working.
pub fn remote_client(config: &AppConfig) -> Option<HttpRecordClient> {
    match HttpRecordClient::from_config(&config.remote) {
        Ok(client) => client,
        Err(error) => {
            tracing::warn!("Remote sync disabled: {} ({})", error, error.hint());
            None
        }
    }
}

pub async fn open_engine(paths: &AppPaths) -> Result<Engine, CliError> {
    let config = load_config(&paths.config_path)?;
    let store = open_store(&paths.db_path).await?;
    let remote = remote_client(&config);
    Ok(SyncEngine::new(store, remote, SystemClock, config.sync))
}

/// Find a diagram by exact id or unique id prefix.
pub async fn resolve_diagram(query: &str, service: &Service) -> Result<DiagramRecord, CliError> {
    let query = normalize_diagram_identifier(query)?;
    if let Some(record) = service.get(&DiagramId::canonical(query.as_str())).await? {
        return Ok(record);
    }

    let mut matches = service
        .list()
        .await?
        .into_iter()
        .filter(|record| record.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Err(CliError::DiagramNotFound(query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|record| short_id(&record.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousDiagramId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_diagram_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyDiagramId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &DiagramId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_diagram_lines(diagrams: &[DiagramRecord], now_ms: i64) -> Vec<String> {
    diagrams
        .iter()
        .map(|diagram| {
            let id = short_id(&diagram.id);
            let title = truncate_chars(&diagram.title, 30);
            let relative_time = format_relative_time(diagram.updated_at, now_ms);
            let marker = sync_marker(diagram);

            if marker.is_empty() {
                format!("{id:<13}  {title:<30}  {relative_time}")
            } else {
                format!("{id:<13}  {title:<30}  {relative_time:<10}  {marker}")
            }
        })
        .collect()
}

/// Local sync state shown next to a diagram in listings.
pub fn sync_marker(diagram: &DiagramRecord) -> String {
    match (diagram.id.is_temporary(), diagram.dirty, diagram.retry_count) {
        (_, false, _) => String::new(),
        (true, true, 0) => "[new]".to_string(),
        (false, true, 0) => "[modified]".to_string(),
        (_, true, retries) => format!("[failed x{retries}]"),
    }
}

pub fn diagram_to_list_item(diagram: &DiagramRecord) -> DiagramListItem {
    let now_ms = Utc::now().timestamp_millis();
    DiagramListItem {
        id: diagram.id.to_string(),
        title: diagram.title.clone(),
        preview: diagram.preview(80),
        created_at: diagram.created_at,
        updated_at: diagram.updated_at,
        relative_time: format_relative_time(diagram.updated_at, now_ms),
        dirty: diagram.dirty,
        retry_count: diagram.retry_count,
    }
}

pub fn conflict_to_item(conflict: &SyncConflict) -> ConflictItem {
    ConflictItem {
        id: conflict.id,
        diagram_id: conflict.diagram_id.to_string(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        detected_at: conflict.detected_at,
        detected_at_iso: format_timestamp(conflict.detected_at),
        resolved_at: conflict.resolved_at,
        resolution: conflict.resolution.map(|resolution| resolution.to_string()),
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let state = conflict
                .resolution
                .map_or_else(|| "open".to_string(), |resolution| format!("kept {resolution}"));
            format!(
                "{}  {:<10}  diagram={}  local={} remote={}",
                format_timestamp(conflict.detected_at),
                state,
                conflict.diagram_id,
                format_timestamp(conflict.local_updated_at),
                format_timestamp(conflict.remote_updated_at)
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Diagram source from a file, piped stdin, or `$EDITOR`, in that order.
pub fn resolve_diagram_source(file: Option<&Path>, initial: &str) -> Result<String, CliError> {
    if let Some(path) = file {
        return normalize_content(&std::fs::read_to_string(path)?).ok_or(CliError::EmptyContent);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    capture_editor_input(initial)?.ok_or(CliError::EmptyContent)
}

/// Trim surrounding blank lines but keep indentation of the first line.
pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim_end();
    let trimmed = trimmed.trim_start_matches(['\n', '\r']);
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_diagram_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program)
        .args(parts)
        .arg(file_path)
        .status()
        .map_err(|error| CliError::EditorFailed(format!("could not start `{editor}`: {error}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_diagram_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("medit-diagram-{}-{now}.mmd", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os("MEDIT_DB_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => dirs::data_dir()
            .map(|dir| dir.join("medit").join("medit.db"))
            .ok_or_else(|| CliError::Config("could not resolve a data directory".to_string())),
    }
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_config_path.or_else(|| env::var_os("MEDIT_CONFIG").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => dirs::config_dir()
            .map(|dir| dir.join("medit").join("config.json"))
            .ok_or_else(|| CliError::Config("could not resolve a config directory".to_string())),
    }
}
