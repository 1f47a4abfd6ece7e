use std::path::Path;

use medit_core::models::DEFAULT_TITLE;

use crate::commands::common::{open_service, resolve_diagram_source};
use crate::error::CliError;

pub async fn run_new(title: Option<&str>, file: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let content = resolve_diagram_source(file, "")?;
    let service = open_service(db_path).await?;
    let created = service
        .create(title.unwrap_or(DEFAULT_TITLE), &content)
        .await?;
    println!("{}", created.id);
    Ok(())
}
