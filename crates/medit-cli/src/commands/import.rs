use std::path::Path;

use chrono::Utc;
use medit_core::db::LocalStore;
use medit_core::export::parse_json_import;

use crate::commands::common::open_store;
use crate::error::CliError;

/// Import a JSON export as new local diagrams. Returns how many were added.
pub async fn run_import(path: &Path, db_path: &Path) -> Result<usize, CliError> {
    let payload = std::fs::read_to_string(path)?;
    let batch = parse_json_import(&payload, Utc::now().timestamp_millis())?;

    let store = open_store(db_path).await?;
    for record in &batch.records {
        store.put(record).await?;
    }

    println!(
        "Imported {} diagram(s){}",
        batch.records.len(),
        if batch.skipped > 0 {
            format!(", skipped {} without title or content", batch.skipped)
        } else {
            String::new()
        }
    );
    Ok(batch.records.len())
}
