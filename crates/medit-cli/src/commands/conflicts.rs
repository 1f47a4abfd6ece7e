use std::path::Path;

use medit_core::clock::SystemClock;
use medit_core::db::LocalStore;
use medit_core::models::Resolution;
use medit_core::services::DiagramService;
use medit_core::sync::ResolveOutcome;

use crate::cli::ResolveChoice;
use crate::commands::common::{
    conflict_to_item, format_conflict_lines, open_engine, open_store, resolve_diagram, AppPaths,
    ConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts(
    include_resolved: bool,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let conflicts = store.list_conflicts(!include_resolved, limit).await?;

    if as_json {
        let items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
    } else {
        for line in format_conflict_lines(&conflicts) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_resolve(id: &str, keep: ResolveChoice, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    if !engine.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let service = DiagramService::new(engine.store().clone(), SystemClock);
    let diagram = resolve_diagram(id, &service).await?;
    let resolution = match keep {
        ResolveChoice::Local => Resolution::Local,
        ResolveChoice::Cloud => Resolution::Cloud,
    };

    let open = engine.store().list_conflicts(true, usize::MAX).await?;
    if !open.iter().any(|conflict| conflict.diagram_id == diagram.id) {
        tracing::warn!("No open conflict logged for {}; applying anyway", diagram.id);
    }

    match engine.resolve(&diagram.id, resolution).await? {
        ResolveOutcome::Applied => println!("Kept the {resolution} version of {}", diagram.id),
        ResolveOutcome::RetryScheduled(error) => eprintln!(
            "Could not apply the {resolution} version of {}: {error} ({}). The diagram stays queued for sync.",
            diagram.id,
            error.hint()
        ),
    }
    Ok(())
}
