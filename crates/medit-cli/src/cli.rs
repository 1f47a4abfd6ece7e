use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "medit")]
#[command(about = "Edit Mermaid diagrams locally and sync them to a cloud table")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new diagram (source from --file, stdin, or $EDITOR)
    #[command(alias = "add")]
    New {
        /// Diagram title
        #[arg(short, long)]
        title: Option<String>,
        /// Read Mermaid source from a file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// List diagrams, newest first
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a diagram's Mermaid source
    Show {
        /// Diagram ID or unique ID prefix
        id: String,
        /// Output the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a diagram's source (from --file, stdin, or $EDITOR)
    Edit {
        /// Diagram ID or unique ID prefix
        id: String,
        /// Read Mermaid source from a file
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Change a diagram's title
    Rename {
        /// Diagram ID or unique ID prefix
        id: String,
        /// New title
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// Delete a diagram locally and remotely
    #[command(alias = "rm")]
    Delete {
        /// Diagram ID or unique ID prefix
        id: String,
    },
    /// Run one full sync pass now
    Sync,
    /// Keep syncing in the foreground until interrupted
    Watch,
    /// List logged sync conflicts
    Conflicts {
        /// Include resolved conflicts
        #[arg(long)]
        all: bool,
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict by keeping one side
    Resolve {
        /// Diagram ID or unique ID prefix
        id: String,
        /// Which version to keep
        #[arg(value_enum)]
        keep: ResolveChoice,
    },
    /// Export all diagrams, or one diagram by id or id prefix
    Export {
        /// Diagram to export (required for `--format mermaid`)
        id: Option<String>,
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import diagrams from a JSON export
    Import {
        /// JSON file produced by `medit export`
        path: PathBuf,
    },
    /// Generate Mermaid source from a description with the configured AI endpoint
    Generate {
        /// What the diagram should show
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Save the result as a new diagram with this title
        #[arg(long, value_name = "TITLE")]
        save: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
    /// Bare Mermaid source of a single diagram (.mmd)
    #[value(alias = "mmd")]
    Mermaid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolveChoice {
    /// Keep the local version and push it over the remote
    Local,
    /// Keep the remote version and overwrite the local copy
    Cloud,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AiAuthArg {
    Bearer,
    ApiKey,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets redacted)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update values in the config file
    Set(ConfigSetArgs),
    /// Remove remote and/or AI settings from the config file
    Clear {
        /// Clear only the remote table settings
        #[arg(long)]
        remote: bool,
        /// Clear only the AI settings
        #[arg(long)]
        ai: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Remote table API base URL
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,
    /// Remote table API token
    #[arg(long, value_name = "TOKEN")]
    pub remote_token: Option<String>,
    /// Remote table id
    #[arg(long, value_name = "ID")]
    pub remote_table: Option<String>,
    /// Chat-completions endpoint URL
    #[arg(long, value_name = "URL")]
    pub ai_url: Option<String>,
    /// AI API key
    #[arg(long, value_name = "KEY")]
    pub ai_key: Option<String>,
    /// AI model name
    #[arg(long, value_name = "MODEL")]
    pub ai_model: Option<String>,
    /// How the AI key is sent
    #[arg(long, value_enum)]
    pub ai_auth: Option<AiAuthArg>,
    /// Seconds between dirty sweeps
    #[arg(long, value_name = "SECS")]
    pub sweep_secs: Option<u64>,
    /// Seconds between full passes
    #[arg(long, value_name = "SECS")]
    pub full_secs: Option<u64>,
    /// Failed attempts counted per diagram before it waits for full passes
    #[arg(long, value_name = "N")]
    pub retry_cap: Option<u32>,
}
