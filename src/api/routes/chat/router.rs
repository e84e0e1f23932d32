//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{delete, get, post},
};
use http::{HeaderValue, header};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::ai::chat::{ChatMessage, NullRenderer, Render, Transcript, TurnError};
use crate::api::state::AppState;
use crate::retriever::Passage;

type SharedState = Arc<RwLock<AppState>>;

/// Forwards each step of a turn to the client as a server-sent
/// event. A client that went away does not stop the turn.
struct SseRenderer {
    tx: mpsc::UnboundedSender<Event>,
}

impl SseRenderer {
    fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    fn send_json<T: Serialize>(&self, name: &str, data: &T) {
        match Event::default().event(name).json_data(data) {
            Ok(event) => self.send(event),
            Err(e) => tracing::error!("Failed to serialize {} event: {}", name, e),
        }
    }
}

impl Render for SseRenderer {
    fn user_message(&mut self, msg: &ChatMessage) {
        self.send_json("user", msg);
    }

    fn fragment(&mut self, fragment: &str, _partial: &str) {
        self.send_json("delta", &json!({ "content": fragment }));
    }

    fn assistant_message(&mut self, msg: &ChatMessage) {
        self.send_json("done", msg);
    }

    fn passages(&mut self, passages: &[Passage]) {
        self.send_json("passages", &passages);
    }

    fn error(&mut self, err: &TurnError) {
        self.send_json("error", &json!({ "message": err.to_string() }));
    }

    fn refresh(&mut self, transcript: &Transcript) {
        self.send_json("refresh", &transcript.messages());
    }
}

/// Add to a chat session, creating it if needed, and stream the turn
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let (chat, session) = {
        let mut shared_state = state.write().expect("Unable to write shared state");
        if let Some(model) = &payload.model
            && !shared_state.catalog.accepts(model)
        {
            return Ok((StatusCode::BAD_REQUEST, format!("Unknown model {}", model)).into_response());
        }
        let session = shared_state.get_or_create_session(&payload.session_id);
        (Arc::clone(&shared_state.chat), session)
    };

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(Ok::<Event, Infallible>);

    tokio::spawn(async move {
        let mut session = session.lock().await;
        if let Some(model) = &payload.model {
            session.set_model(model);
        }
        let mut ui = SseRenderer { tx };
        // Failures were already sent to the client as an error event
        let _ = chat.send(&mut session, &payload.message, &mut ui).await;
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Get a single chat session by ID
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let session = state.read().expect("Unable to read shared state").session(&id);
    let Some(session) = session else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", id),
        )
            .into_response());
    };
    let session = session.lock().await;

    Ok(axum::Json(public::ChatTranscriptResponse {
        id: session.id().to_string(),
        model: session.model().map(str::to_string),
        state: session.state(),
        created_at: session.created_at(),
        transcript: session.transcript().messages().to_vec(),
    })
    .into_response())
}

/// Download the transcript as a JSON file
async fn chat_export(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let session = state.read().expect("Unable to read shared state").session(&id);
    let Some(session) = session else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", id),
        )
            .into_response());
    };
    let body = session.lock().await.export()?;
    let disposition = format!("attachment; filename=\"{}\"", public::EXPORT_FILE_NAME);

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_DISPOSITION, HeaderValue::from_str(&disposition)?),
        ],
        body,
    )
        .into_response())
}

/// Clear the transcript of a chat session
async fn chat_clear(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let session = state.read().expect("Unable to read shared state").session(&id);
    if let Some(session) = session {
        session.lock().await.clear(&mut NullRenderer);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// End a chat session, discarding its transcript
async fn chat_end(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let ended = state
        .write()
        .expect("Unable to write shared state")
        .end_session(&id);
    if !ended {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", id),
        )
            .into_response());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/{id}", get(chat_session).delete(chat_clear))
        .route("/{id}/export", get(chat_export))
        .route("/{id}/session", delete(chat_end))
}
