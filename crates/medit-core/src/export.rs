//! Diagram export and import helpers.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::DiagramRecord;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable diagram used in JSON exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDiagram {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&DiagramRecord> for ExportDiagram {
    fn from(record: &DiagramRecord) -> Self {
        Self {
            id: record.id.to_string(),
            title: record.title.clone(),
            content: record.content.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Render diagrams as pretty-printed JSON.
pub fn render_json_export(diagrams: &[DiagramRecord]) -> serde_json::Result<String> {
    let items = diagrams
        .iter()
        .map(ExportDiagram::from)
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&items)
}

/// Render diagrams as Markdown sections with fenced `mermaid` blocks.
#[must_use]
pub fn render_markdown_export(diagrams: &[DiagramRecord]) -> String {
    let mut output = String::new();

    for (index, diagram) in diagrams.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let _ = writeln!(output, "## {}", diagram.title);
        let _ = writeln!(output);
        let _ = writeln!(output, "```mermaid");
        output.push_str(diagram.content.trim_end());
        output.push('\n');
        let _ = writeln!(output, "```");
    }

    output
}

pub fn render_export(diagrams: &[DiagramRecord], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(diagrams),
        ExportFormat::Markdown => Ok(render_markdown_export(diagrams)),
    }
}

#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("medit-export-{timestamp_ms}.{}", format.extension())
}

/// One diagram's source as a standalone `.mmd` file.
#[must_use]
pub fn render_mermaid(diagram: &DiagramRecord) -> String {
    let mut output = diagram.content.trim_end().to_string();
    output.push('\n');
    output
}

/// `.mmd` file name derived from the diagram title.
#[must_use]
pub fn mermaid_file_name(diagram: &DiagramRecord) -> String {
    let mut slug = String::new();
    for ch in diagram.title.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "diagram.mmd".to_string()
    } else {
        format!("{slug}.mmd")
    }
}

/// Entry accepted on import. Ids and timestamps are ignored.
#[derive(Debug, Deserialize)]
struct ImportEntry {
    #[serde(default, alias = "name", alias = "Title")]
    title: Option<String>,
    #[serde(default, alias = "mermaidCode", alias = "MermaidCode")]
    content: Option<String>,
}

/// Result of parsing an import payload.
#[derive(Debug)]
pub struct ImportBatch {
    /// New dirty records with temporary ids
    pub records: Vec<DiagramRecord>,
    /// Entries skipped for a missing title or content
    pub skipped: usize,
}

/// Parse a JSON array of diagrams into fresh local records.
///
/// Imported diagrams always get new temporary ids so they never collide with
/// existing local or remote records.
pub fn parse_json_import(payload: &str, now_ms: i64) -> Result<ImportBatch> {
    let entries: Vec<ImportEntry> = serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("import must be a JSON array: {error}")))?;

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        let title = entry.title.unwrap_or_default();
        let content = entry.content.unwrap_or_default();
        if title.trim().is_empty() || content.trim().is_empty() {
            skipped += 1;
            continue;
        }
        records.push(DiagramRecord::new(title.trim(), content, now_ms));
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} import entries without title or content", skipped);
    }
    Ok(ImportBatch { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagramId;
    use pretty_assertions::assert_eq;

    fn diagram() -> DiagramRecord {
        DiagramRecord {
            id: DiagramId::canonical("12"),
            title: "Checkout flow".to_string(),
            content: "graph TD\n    A --> B\n".to_string(),
            created_at: 123,
            updated_at: 456,
            dirty: false,
            retry_count: 0,
        }
    }

    #[test]
    fn markdown_export_fences_mermaid_source() {
        let rendered = render_markdown_export(&[diagram()]);
        assert_eq!(
            rendered,
            "## Checkout flow\n\n```mermaid\ngraph TD\n    A --> B\n```\n"
        );
    }

    #[test]
    fn json_export_lists_fields() {
        let rendered = render_json_export(&[diagram()]).unwrap();
        let parsed: Vec<ExportDiagram> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed[0].id, "12");
        assert_eq!(parsed[0].updated_at, 456);
    }

    #[test]
    fn import_creates_fresh_dirty_records_and_skips_incomplete_entries() {
        let payload = r#"[
            { "id": "12", "title": "Flow", "content": "graph TD" },
            { "name": "Legacy", "content": "sequenceDiagram" },
            { "title": "", "content": "graph LR" },
            { "title": "No content" }
        ]"#;

        let batch = parse_json_import(payload, 1_000).unwrap();

        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.records.len(), 2);
        assert!(batch.records.iter().all(|record| record.id.is_temporary()));
        assert!(batch.records.iter().all(|record| record.dirty));
        assert_eq!(batch.records[1].title, "Legacy");
        assert_eq!(batch.records[0].created_at, 1_000);
    }

    #[test]
    fn import_rejects_non_array_payload() {
        let error = parse_json_import(r#"{ "title": "x" }"#, 0).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn mermaid_export_is_the_bare_source() {
        assert_eq!(render_mermaid(&diagram()), "graph TD\n    A --> B\n");
        assert_eq!(mermaid_file_name(&diagram()), "checkout-flow.mmd");

        let untitled = DiagramRecord {
            title: " ?! ".to_string(),
            ..diagram()
        };
        assert_eq!(mermaid_file_name(&untitled), "diagram.mmd");

        let punctuated = DiagramRecord {
            title: "Login / Signup (v2)".to_string(),
            ..diagram()
        };
        assert_eq!(mermaid_file_name(&punctuated), "login-signup-v2.mmd");
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "medit-export-456.md"
        );
    }
}
