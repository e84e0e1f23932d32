//! Document retrieval backed by a hosted retriever service.
pub mod denser;
pub use denser::{DenserRetriever, RetrieveRequest, RetrieveResponse};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A retrieved span of text and its relevance score.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub page_content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Passage {
    pub fn new(page_content: &str, score: f64) -> Self {
        Self {
            page_content: page_content.to_string(),
            score,
            metadata: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Retrieval failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Retrieval request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed retrieval response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most `top_k` passages in the order the service
    /// ranked them.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
