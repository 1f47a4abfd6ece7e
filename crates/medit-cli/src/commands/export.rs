use std::path::{Path, PathBuf};

use chrono::Utc;
use medit_core::export::{
    self, mermaid_file_name, render_export, render_mermaid, suggested_export_file_name,
};
use medit_core::DiagramRecord;

use crate::cli::ExportFormat;
use crate::commands::common::{open_service, resolve_diagram};
use crate::error::CliError;

pub async fn run_export(
    id: Option<&str>,
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let diagrams = match id {
        Some(id) => vec![resolve_diagram(id, &service).await?],
        None => service.list().await?,
    };

    let (rendered, file_name) = match (format, diagrams.as_slice()) {
        (ExportFormat::Mermaid, [diagram]) if id.is_some() => {
            (render_mermaid(diagram), mermaid_file_name(diagram))
        }
        (ExportFormat::Mermaid, _) => return Err(CliError::MermaidExportNeedsDiagram),
        (ExportFormat::Json, _) => collection_export(&diagrams, export::ExportFormat::Json)?,
        (ExportFormat::Markdown, _) => {
            collection_export(&diagrams, export::ExportFormat::Markdown)?
        }
    };

    if let Some(path) = output_path {
        let path = export_target(path, &file_name);
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

fn collection_export(
    diagrams: &[DiagramRecord],
    format: export::ExportFormat,
) -> Result<(String, String), CliError> {
    let rendered = render_export(diagrams, format)?;
    let file_name = suggested_export_file_name(format, Utc::now().timestamp_millis());
    Ok((rendered, file_name))
}

/// An existing directory gets `file_name` inside it.
fn export_target(path: &Path, file_name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(file_name)
    } else {
        path.to_path_buf()
    }
}
