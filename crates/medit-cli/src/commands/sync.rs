use medit_core::sync::{ConflictEvent, SyncOutcome};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

use crate::commands::common::{format_timestamp, open_engine, AppPaths, Engine};
use crate::error::CliError;

pub async fn run_sync(paths: &AppPaths) -> Result<(), CliError> {
    let engine = configured_engine(paths).await?;
    let mut conflicts = engine.subscribe();

    let outcome = engine.sync_now().await?;
    print_pending_conflicts(&mut conflicts);

    match outcome {
        SyncOutcome::Completed(report) => {
            if report.is_idle() && report.awaiting == 0 && report.deferred == 0 {
                println!("Everything is up to date.");
            } else {
                println!("{report}");
            }
            if let Some(reason) = &report.interrupted {
                eprintln!("Sync stopped early: {reason} ({})", reason.hint());
            }
            Ok(())
        }
        SyncOutcome::Aborted(error) => Err(CliError::SyncAborted(error)),
        SyncOutcome::Skipped => {
            println!("A sync pass is already running.");
            Ok(())
        }
        SyncOutcome::LocalOnly => Err(CliError::SyncNotConfigured),
    }
}

/// Sync on the configured intervals until Ctrl-C, printing conflicts as they
/// are detected.
pub async fn run_watch(paths: &AppPaths) -> Result<(), CliError> {
    let engine = configured_engine(paths).await?;
    let mut conflicts = engine.subscribe();

    println!(
        "Watching for changes (sweep every {}s, full sync every {}s). Press Ctrl-C to stop.",
        engine.settings().sweep_interval().as_secs(),
        engine.settings().full_interval().as_secs()
    );

    let report_conflicts = async {
        loop {
            match conflicts.recv().await {
                Ok(event) => println!("{}", describe_conflict(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Missed {} conflict notifications; run `medit conflicts` for the full list",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        () = engine.run_until(shutdown_signal()) => {}
        () = report_conflicts => {}
    }

    println!("Stopped.");
    Ok(())
}

async fn configured_engine(paths: &AppPaths) -> Result<Engine, CliError> {
    let engine = open_engine(paths).await?;
    if engine.is_configured() {
        Ok(engine)
    } else {
        Err(CliError::SyncNotConfigured)
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", error);
    }
}

fn print_pending_conflicts(conflicts: &mut Receiver<ConflictEvent>) {
    loop {
        match conflicts.try_recv() {
            Ok(event) => println!("{}", describe_conflict(&event)),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

pub fn describe_conflict(event: &ConflictEvent) -> String {
    format!(
        "Conflict on \"{}\" ({}): local edit {} vs cloud edit {}. Keep one with `medit resolve {} local` or `medit resolve {} cloud`.",
        event.local.title,
        event.local.id,
        format_timestamp(event.local.updated_at),
        format_timestamp(event.cloud.updated_at),
        event.local.id,
        event.local.id
    )
}
