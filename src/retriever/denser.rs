use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Passage, RetrievalError, Retriever};

#[derive(Debug, Serialize)]
pub struct RetrieveRequest<'a> {
    pub query: &'a str,
    pub id: &'a str,
    pub k: usize,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveResponse {
    pub passages: Vec<Passage>,
}

/// Client for the Denser retriever API.
#[derive(Clone)]
pub struct DenserRetriever {
    client: reqwest::Client,
    url: String,
    api_key: String,
    retriever_id: String,
    timeout: Duration,
}

impl DenserRetriever {
    pub fn new(url: &str, api_key: &str, retriever_id: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            api_key: api_key.to_string(),
            retriever_id: retriever_id.to_string(),
            timeout,
        }
    }

    /// Sends the request and returns the raw JSON body without
    /// validating it. Used for probing the service.
    pub async fn retrieve_raw(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<serde_json::Value, RetrievalError> {
        let body = self.send(query, top_k).await?;
        serde_json::from_str(&body).map_err(|e| RetrievalError::MalformedResponse(e.to_string()))
    }

    async fn send(&self, query: &str, top_k: usize) -> Result<String, RetrievalError> {
        let payload = RetrieveRequest {
            query,
            id: &self.retriever_id,
            k: top_k,
        };
        tracing::debug!("Retrieving {} passages for query {:?}", top_k, query);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Retriever for DenserRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let body = self.send(query, top_k).await?;
        let resp: RetrieveResponse = serde_json::from_str(&body)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))?;

        let mut passages = resp.passages;
        if passages.len() > top_k {
            tracing::warn!(
                "Retriever returned {} passages, keeping the first {}",
                passages.len(),
                top_k
            );
            passages.truncate(top_k);
        }
        Ok(passages)
    }
}
