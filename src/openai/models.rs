//! Model listing for an OpenAI compatible API.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub id: String,
}

/// The shape shared by the `/v1/models` response and the local
/// catalog cache file. Fields other than `id` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelList {
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    pub fn ids(&self) -> Vec<String> {
        self.data.iter().map(|m| m.id.clone()).collect()
    }
}

/// A successful listing: the raw body exactly as received plus the
/// parsed model ids.
#[derive(Debug)]
pub struct ModelListing {
    pub body: String,
    pub models: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ModelListingError {
    #[error("Failed to fetch models: {0}")]
    Status(u16),

    #[error("Failed to fetch models: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected model listing format: {0}")]
    Format(#[from] serde_json::Error),
}

pub async fn list_models(
    api_hostname: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<ModelListing, ModelListingError> {
    let url = format!("{}/v1/models", api_hostname.trim_end_matches('/'));
    tracing::debug!("Fetching model listing from {}", url);

    let response = reqwest::Client::new()
        .get(url)
        .bearer_auth(api_key)
        .timeout(timeout)
        .send()
        .await?;

    // Only a 200 counts
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(ModelListingError::Status(status.as_u16()));
    }

    let body = response.text().await?;
    let list: ModelList = serde_json::from_str(&body)?;

    Ok(ModelListing {
        body,
        models: list.ids(),
    })
}
