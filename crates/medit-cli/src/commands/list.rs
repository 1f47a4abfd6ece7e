use std::path::Path;

use chrono::Utc;

use crate::commands::common::{
    diagram_to_list_item, format_diagram_lines, open_service, DiagramListItem,
};
use crate::error::CliError;

pub async fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let diagrams = open_service(db_path).await?.list().await?;

    if as_json {
        let json_items = diagrams
            .iter()
            .map(diagram_to_list_item)
            .collect::<Vec<DiagramListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if diagrams.is_empty() {
        println!("No diagrams yet. Create one with `medit new`.");
    } else {
        for line in format_diagram_lines(&diagrams, Utc::now().timestamp_millis()) {
            println!("{line}");
        }
    }

    Ok(())
}
