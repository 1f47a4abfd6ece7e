use medit_core::clock::SystemClock;
use medit_core::services::DiagramService;
use medit_core::sync::SyncOutcome;

use crate::commands::common::{open_engine, resolve_diagram, AppPaths};
use crate::error::CliError;

/// Delete locally, then try the remote delete right away when sync is
/// configured. A failed attempt stays queued for the next sync.
pub async fn run_delete(id: &str, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    let service = DiagramService::new(engine.store().clone(), SystemClock);
    let diagram = resolve_diagram(id, &service).await?;

    service.delete(&diagram.id).await?;
    println!("{}", diagram.id);

    if diagram.id.is_temporary() || !engine.is_configured() {
        return Ok(());
    }
    match engine.drain_queue().await? {
        SyncOutcome::Completed(report) if report.queue_pending > 0 => {
            eprintln!("Remote delete queued; it will be retried on the next sync.");
        }
        SyncOutcome::Aborted(error) => {
            eprintln!("Remote delete queued: {error} ({})", error.hint());
        }
        _ => {}
    }
    Ok(())
}
