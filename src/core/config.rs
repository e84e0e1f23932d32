use std::env;
use std::time::Duration;

use anyhow::{Result, anyhow};

pub const DEFAULT_LLM_HOST: &str = "https://api.groq.com/openai";
pub const DEFAULT_RETRIEVER_URL: &str = "https://retriever.denser.ai/api/retrievers/retrieve";
pub const DEFAULT_MODELS_PATH: &str = "groq_models.json";
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SUBJECT: &str = r#"the Python library "Instructor""#;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm_api_hostname: String,
    pub llm_api_key: Option<String>,
    pub retriever_url: String,
    pub retriever_api_key: String,
    pub retriever_id: String,
    pub models_path: String,
    pub default_model: Option<String>,
    pub top_k: usize,
    pub request_timeout: Duration,
    pub subject: String,
}

impl AppConfig {
    /// Reads the full configuration from the environment. The
    /// retriever credentials are required, the LLM key is not since
    /// the terminal chat can ask for it.
    pub fn from_env() -> Result<Self> {
        let retriever_api_key = required_var("DENSER_RETRIEVER_API_KEY")?;
        let retriever_id = required_var("RETRIEVER_ID")?;
        let top_k = match env::var("RAGCHAT_TOP_K") {
            Ok(v) => parse_top_k(&v)?,
            Err(_) => DEFAULT_TOP_K,
        };

        Ok(Self {
            llm_api_hostname: llm_api_hostname(),
            llm_api_key: llm_api_key(),
            retriever_url: env::var("RAGCHAT_RETRIEVER_URL")
                .unwrap_or_else(|_| DEFAULT_RETRIEVER_URL.to_string()),
            retriever_api_key,
            retriever_id,
            models_path: models_path(),
            default_model: env::var("RAGCHAT_MODEL").ok().filter(|m| !m.is_empty()),
            top_k,
            request_timeout: request_timeout()?,
            subject: env::var("RAGCHAT_SUBJECT").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string()),
        })
    }
}

/// Number of passages per question, at least 1.
pub fn parse_top_k(value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(k) if k > 0 => Ok(k),
        Ok(_) => Err(anyhow!("Invalid RAGCHAT_TOP_K {:?}: must be at least 1", value)),
        Err(e) => Err(anyhow!("Invalid RAGCHAT_TOP_K {:?}: {}", value, e)),
    }
}

/// Timeout for calls to the retriever and the model listing.
pub fn request_timeout() -> Result<Duration> {
    let secs = match env::var("RAGCHAT_TIMEOUT_SECS") {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|e| anyhow!("Invalid RAGCHAT_TIMEOUT_SECS {:?}: {}", v, e))?,
        Err(_) => DEFAULT_TIMEOUT_SECS,
    };
    Ok(Duration::from_secs(secs))
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(anyhow!("Missing env var {}", name)),
    }
}

/// Base URL of the OpenAI compatible LLM API.
pub fn llm_api_hostname() -> String {
    env::var("RAGCHAT_LLM_HOST").unwrap_or_else(|_| DEFAULT_LLM_HOST.to_string())
}

pub fn llm_api_key() -> Option<String> {
    env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Location of the cached model catalog shared by the chat and the
/// refresh tool.
pub fn models_path() -> String {
    env::var("RAGCHAT_MODELS_PATH").unwrap_or_else(|_| DEFAULT_MODELS_PATH.to_string())
}
