//! medit - Command-line interface for Mermaid Edit
//!
//! Edit Mermaid diagrams offline; `medit sync` and `medit watch` reconcile
//! them with the configured cloud table.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_config_path, resolve_db_path, AppPaths};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::conflicts::{run_conflicts, run_resolve};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, run_rename};
use crate::commands::export::run_export;
use crate::commands::generate::run_generate;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::new::run_new;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "medit=info,medit_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = AppPaths {
        db_path: resolve_db_path(cli.db_path)?,
        config_path: resolve_config_path(cli.config)?,
    };
    let db_path = paths.db_path.as_path();

    match cli.command {
        Commands::New { title, file } => {
            run_new(title.as_deref(), file.as_deref(), db_path).await?;
        }
        Commands::List { json } => run_list(json, db_path).await?,
        Commands::Show { id, json } => run_show(&id, json, db_path).await?,
        Commands::Edit { id, file } => run_edit(&id, file.as_deref(), db_path).await?,
        Commands::Rename { id, title } => run_rename(&id, &title, db_path).await?,
        Commands::Delete { id } => run_delete(&id, &paths).await?,
        Commands::Sync => run_sync(&paths).await?,
        Commands::Watch => run_watch(&paths).await?,
        Commands::Conflicts { all, limit, json } => {
            run_conflicts(all, limit, json, db_path).await?;
        }
        Commands::Resolve { id, keep } => run_resolve(&id, keep, &paths).await?,
        Commands::Export { id, format, output } => {
            run_export(id.as_deref(), format, output.as_deref(), db_path).await?;
        }
        Commands::Import { path } => {
            run_import(&path, db_path).await?;
        }
        Commands::Generate { prompt, save } => {
            run_generate(&prompt, save.as_deref(), &paths.config_path, db_path).await?;
        }
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, &paths.config_path)?,
    }

    Ok(())
}
