use std::path::Path;

use medit_core::config::{AiAuth, AiConfig, AppConfig, RemoteConfig};
use medit_core::util::{is_http_url, normalize_text_option, trim_url};

use crate::cli::{AiAuthArg, ConfigCommands, ConfigSetArgs};
use crate::commands::common::load_config;
use crate::error::CliError;

const REDACTED: &str = "[REDACTED]";

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_config_show(json, config_path),
        ConfigCommands::Set(args) => run_config_set(args, config_path),
        ConfigCommands::Clear { remote, ai } => run_config_clear(remote, ai, config_path),
    }
}

fn run_config_show(as_json: bool, config_path: &Path) -> Result<(), CliError> {
    let config = redacted(load_config(config_path)?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Config file: {}", config_path.display());
    for line in format_config_lines(&config) {
        println!("{line}");
    }
    Ok(())
}

fn run_config_set(args: ConfigSetArgs, config_path: &Path) -> Result<(), CliError> {
    let mut config = AppConfig::load_from_path(config_path)?;
    apply_config_set(&mut config, args)?;
    config.save_to_path(config_path)?;
    println!("Configuration saved to {}", config_path.display());

    let missing = config.remote.missing_fields();
    if config.remote.is_any_set() && !missing.is_empty() {
        println!("Remote sync still needs: {}", missing.join(", "));
    }
    Ok(())
}

fn run_config_clear(remote: bool, ai: bool, config_path: &Path) -> Result<(), CliError> {
    let mut config = AppConfig::load_from_path(config_path)?;
    clear_config(&mut config, remote, ai);
    config.save_to_path(config_path)?;
    println!("Configuration saved to {}", config_path.display());
    Ok(())
}

/// Merge explicit `config set` values into `config`.
pub fn apply_config_set(config: &mut AppConfig, args: ConfigSetArgs) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(args.remote_url) {
        config.remote.base_url = Some(require_http_url("remote URL", url)?);
    }
    if let Some(token) = normalize_text_option(args.remote_token) {
        config.remote.api_token = Some(token);
    }
    if let Some(table) = normalize_text_option(args.remote_table) {
        config.remote.table_id = Some(table);
    }
    if let Some(url) = normalize_text_option(args.ai_url) {
        config.ai.base_url = Some(require_http_url("AI URL", url)?);
    }
    if let Some(key) = normalize_text_option(args.ai_key) {
        config.ai.api_key = Some(key);
    }
    if let Some(model) = normalize_text_option(args.ai_model) {
        config.ai.model = Some(model);
    }
    if let Some(auth) = args.ai_auth {
        config.ai.auth = match auth {
            AiAuthArg::Bearer => AiAuth::Bearer,
            AiAuthArg::ApiKey => AiAuth::ApiKey,
        };
    }
    if let Some(secs) = args.sweep_secs {
        config.sync.sweep_interval_secs = require_positive("sweep interval", secs)?;
    }
    if let Some(secs) = args.full_secs {
        config.sync.full_interval_secs = require_positive("full sync interval", secs)?;
    }
    if let Some(cap) = args.retry_cap {
        if cap == 0 {
            return Err(CliError::Config(
                "retry cap must be greater than zero".to_string(),
            ));
        }
        config.sync.retry_cap = cap;
    }
    Ok(())
}

/// Reset the remote and/or AI sections; with neither flag, reset both.
pub fn clear_config(config: &mut AppConfig, remote: bool, ai: bool) {
    let clear_all = !remote && !ai;
    if remote || clear_all {
        config.remote = RemoteConfig::default();
    }
    if ai || clear_all {
        config.ai = AiConfig::default();
    }
}

/// Copy of `config` with secrets masked, safe to print.
pub fn redacted(mut config: AppConfig) -> AppConfig {
    if config.remote.api_token.is_some() {
        config.remote.api_token = Some(REDACTED.to_string());
    }
    if config.ai.api_key.is_some() {
        config.ai.api_key = Some(REDACTED.to_string());
    }
    config
}

pub fn format_config_lines(config: &AppConfig) -> Vec<String> {
    let value = |value: &Option<String>| value.clone().unwrap_or_else(|| "(not set)".to_string());
    let remote_state = if config.remote.is_complete() {
        "enabled".to_string()
    } else if config.remote.is_any_set() {
        format!(
            "disabled, missing {}",
            config.remote.missing_fields().join(", ")
        )
    } else {
        "local-only".to_string()
    };

    vec![
        format!("Remote sync: {remote_state}"),
        format!("  base_url: {}", value(&config.remote.base_url)),
        format!("  api_token: {}", value(&config.remote.api_token)),
        format!("  table_id: {}", value(&config.remote.table_id)),
        format!(
            "AI generation: {}",
            if config.ai.is_configured() {
                "enabled"
            } else {
                "disabled"
            }
        ),
        format!("  base_url: {}", value(&config.ai.base_url)),
        format!("  api_key: {}", value(&config.ai.api_key)),
        format!("  model: {}", value(&config.ai.model)),
        format!(
            "  auth: {}",
            match config.ai.auth {
                AiAuth::Bearer => "bearer",
                AiAuth::ApiKey => "api-key",
            }
        ),
        format!(
            "Sync: sweep every {}s, full pass every {}s, retry cap {}",
            config.sync.sweep_interval_secs,
            config.sync.full_interval_secs,
            config.sync.retry_cap
        ),
    ]
}

fn require_http_url(label: &str, url: String) -> Result<String, CliError> {
    if is_http_url(&url) {
        Ok(trim_url(&url).to_string())
    } else {
        Err(CliError::Config(format!(
            "{label} must include http:// or https://"
        )))
    }
}

fn require_positive(label: &str, value: u64) -> Result<u64, CliError> {
    if value == 0 {
        Err(CliError::Config(format!("{label} must be greater than zero")))
    } else {
        Ok(value)
    }
}
