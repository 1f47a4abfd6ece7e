use std::path::Path;

use medit_core::ai::AiClient;

use crate::commands::common::{load_config, open_service};
use crate::error::CliError;

pub async fn run_generate(
    prompt: &[String],
    save_as: Option<&str>,
    config_path: &Path,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    if !config.ai.is_configured() {
        return Err(CliError::AiNotConfigured);
    }

    let client = AiClient::from_config(&config.ai)?;
    let code = client.generate(&prompt.join(" ")).await?;

    match save_as {
        Some(title) => {
            let created = open_service(db_path).await?.create(title, &code).await?;
            println!("{}", created.id);
        }
        None => println!("{code}"),
    }
    Ok(())
}
