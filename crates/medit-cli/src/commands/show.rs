use std::path::Path;

use crate::commands::common::{open_service, resolve_diagram};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path).await?;
    let diagram = resolve_diagram(id, &service).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&diagram)?);
    } else {
        println!("{}", diagram.content);
    }
    Ok(())
}
