use std::path::Path;

use crate::commands::common::{open_service, resolve_diagram, resolve_diagram_source};
use crate::error::CliError;

pub async fn run_edit(id: &str, file: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let diagram = resolve_diagram(id, &service).await?;

    let edited = match resolve_diagram_source(file, &diagram.content) {
        Err(CliError::EmptyContent) => return Err(CliError::EmptyEditedContent),
        other => other?,
    };

    let updated = service.update_content(&diagram.id, &edited).await?;
    if updated.updated_at == diagram.updated_at {
        tracing::debug!("Diagram {} unchanged", diagram.id);
    }
    println!("{}", updated.id);
    Ok(())
}

pub async fn run_rename(id: &str, title: &[String], db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let diagram = resolve_diagram(id, &service).await?;

    let renamed = service.rename(&diagram.id, &title.join(" ")).await?;
    println!("{}  {}", renamed.id, renamed.title);
    Ok(())
}
