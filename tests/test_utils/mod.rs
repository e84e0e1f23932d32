//! Test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};

use ragchat::api::AppState;
use ragchat::api::app;
use ragchat::core::AppConfig;

pub const MODELS_JSON: &str = r#"{"object":"list","data":[{"id":"llama3-8b-8192","object":"model"},{"id":"gemma-7b-it","object":"model"}]}"#;

/// Writes a model catalog with two models into `dir` and returns
/// its path.
pub fn write_models(dir: &Path) -> String {
    let path = dir.join("groq_models.json");
    fs::write(&path, MODELS_JSON).expect("Failed to write models file");
    path.display().to_string()
}

/// Creates a test application router that talks to the given LLM
/// and retriever servers, usually `mockito` servers.
pub fn test_app(llm_url: &str, retriever_url: &str, models_path: &str) -> Router {
    let app_config = AppConfig {
        llm_api_hostname: llm_url.to_string(),
        llm_api_key: Some(String::from("test-groq-key")),
        retriever_url: format!("{}/api/retrievers/retrieve", retriever_url),
        retriever_api_key: String::from("test-retriever-key"),
        retriever_id: String::from("test-retriever-id"),
        models_path: models_path.to_string(),
        default_model: None,
        top_k: 3,
        request_timeout: Duration::from_secs(5),
        subject: String::from("the Python library \"Instructor\""),
    };
    let app_state = AppState::from_config(app_config).expect("Failed to build app state");
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf8")
}
