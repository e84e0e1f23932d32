use anyhow::{Context, Result};
use serde_json::json;

use crate::core::AppConfig;
use crate::retriever::DenserRetriever;

/// Probes the retriever with one query and saves the raw response
/// next to the query for inspection.
pub async fn run(query: &str, k: usize, output: &str) -> Result<()> {
    super::init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));

    let config = AppConfig::from_env()?;
    let retriever = DenserRetriever::new(
        &config.retriever_url,
        &config.retriever_api_key,
        &config.retriever_id,
        config.request_timeout,
    );
    let response = retriever.retrieve_raw(query, k).await?;

    let out = json!({
        "user_query": query,
        "denser_retriever_api_response": response,
    });
    tokio::fs::write(output, serde_json::to_string_pretty(&out)?)
        .await
        .with_context(|| format!("Failed to write {}", output))?;

    println!("Saved retrieval for {:?} to {}", query, output);
    Ok(())
}
