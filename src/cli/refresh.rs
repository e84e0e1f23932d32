use anyhow::{Result, anyhow};

use crate::catalog;
use crate::core::config;

pub async fn run() -> Result<()> {
    super::init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));

    let api_key =
        config::llm_api_key().ok_or_else(|| anyhow!("GROQ_API_KEY environment variable not set"))?;
    let models_path = config::models_path();

    let count = catalog::refresh(
        &config::llm_api_hostname(),
        &api_key,
        &models_path,
        config::request_timeout()?,
    )
    .await?;

    println!("Fetched and saved {} models to {}", count, models_path);
    Ok(())
}
