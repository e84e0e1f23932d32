//! Public types for the chat API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::chat::{ChatMessage, TurnState};

pub const EXPORT_FILE_NAME: &str = "chat_history.json";

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    // Switches the session's model before the turn starts
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct ChatTranscriptResponse {
    pub id: String,
    pub model: Option<String>,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
    pub transcript: Vec<ChatMessage>,
}
