use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::models::{ChatMessage, Transcript};
use crate::ai::prompt;
use crate::core::config::{DEFAULT_SUBJECT, DEFAULT_TOP_K};
use crate::openai::{CompletionError, CompletionService, Message, Role};
use crate::retriever::{Passage, RetrievalError, Retriever};

/// Where the latest turn of a session is. A new turn always starts
/// from `Idle`, including after `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    AwaitingRetrieval,
    AwaitingCompletion,
    Rendered,
    Failed,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{0}")]
    Retrieval(#[from] RetrievalError),

    #[error("{0}")]
    Completion(#[from] CompletionError),

    #[error("Failed to build prompt: {0}")]
    Prompt(String),
}

/// The view of a chat. Implementations decide how each step of a
/// turn is shown to the user.
pub trait Render: Send {
    fn user_message(&mut self, msg: &ChatMessage);

    /// Called once per streamed fragment with the partial answer
    /// accumulated so far.
    fn fragment(&mut self, fragment: &str, partial: &str);

    fn assistant_message(&mut self, msg: &ChatMessage);

    /// The passages that grounded the latest answer, in retrieval
    /// order.
    fn passages(&mut self, passages: &[Passage]);

    fn error(&mut self, err: &TurnError);

    /// Redraw everything from the transcript.
    fn refresh(&mut self, transcript: &Transcript);
}

/// Everything one user's conversation owns. Created at session
/// start, mutated by `Chat::send` and `Session::clear`, dropped at
/// session end.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    model: Option<String>,
    transcript: Transcript,
    state: TurnState,
}

impl Session {
    pub fn new(model: Option<String>) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), model)
    }

    pub fn with_id(id: &str, model: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            model,
            transcript: Transcript::new(),
            state: TurnState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = Some(model.to_string());
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn export(&self) -> serde_json::Result<String> {
        self.transcript.export()
    }

    pub fn clear(&mut self, ui: &mut dyn Render) {
        self.transcript.clear();
        self.state = TurnState::Idle;
        ui.refresh(&self.transcript);
    }
}

/// Retrieval augmented chat over an OpenAI compatible completion
/// API.
///
/// Each turn retrieves passages for the user's message, grounds the
/// system prompt in them and streams the answer back through a
/// `Render`. Use `ChatBuilder` to construct one.
pub struct Chat {
    retriever: Arc<dyn Retriever>,
    completion: Arc<dyn CompletionService>,
    templates: Handlebars<'static>,
    subject: String,
    top_k: usize,
}

impl Chat {
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Runs one turn for `input`. The user message is kept in the
    /// transcript whatever happens; an assistant message is added
    /// only when the whole answer streamed successfully.
    pub async fn send(
        &self,
        session: &mut Session,
        input: &str,
        ui: &mut dyn Render,
    ) -> Result<ChatMessage, TurnError> {
        session.state = TurnState::Idle;
        let user_msg = ChatMessage::user(input);
        session.transcript.push(user_msg.clone());
        ui.user_message(&user_msg);

        match self.run_turn(session, input, ui).await {
            Ok(msg) => {
                session.state = TurnState::Rendered;
                Ok(msg)
            }
            Err(err) => {
                tracing::error!(
                    "Turn failed for session {} in state {:?}: {}",
                    session.id,
                    session.state,
                    err
                );
                session.state = TurnState::Failed;
                ui.error(&err);
                Err(err)
            }
        }
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        input: &str,
        ui: &mut dyn Render,
    ) -> Result<ChatMessage, TurnError> {
        let model = session.model.clone().ok_or(CompletionError::NoModel)?;

        session.state = TurnState::AwaitingRetrieval;
        let passages = self.retriever.retrieve(input, self.top_k).await?;
        tracing::debug!("Retrieved {} passages", passages.len());

        session.state = TurnState::AwaitingCompletion;
        let system_prompt = prompt::retrieval_answer(&self.templates, &self.subject, &passages)
            .map_err(|e| TurnError::Prompt(e.to_string()))?;
        let mut messages = vec![Message::new(Role::System, &system_prompt)];
        messages.extend(session.transcript.history());

        let mut stream = self.completion.stream(&model, &messages).await?;
        let mut answer = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            answer.push_str(&fragment);
            ui.fragment(&fragment, &answer);
        }

        let msg = ChatMessage::assistant(&answer, passages);
        session.transcript.push(msg.clone());
        ui.assistant_message(&msg);
        ui.passages(msg.chunks.as_deref().unwrap_or_default());

        Ok(msg)
    }
}

pub struct ChatBuilder {
    retriever: Arc<dyn Retriever>,
    completion: Arc<dyn CompletionService>,
    subject: String,
    top_k: usize,
}

impl ChatBuilder {
    pub fn new(retriever: Arc<dyn Retriever>, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            retriever,
            completion,
            subject: DEFAULT_SUBJECT.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn build(self) -> Chat {
        Chat {
            retriever: self.retriever,
            completion: self.completion,
            templates: prompt::templates(),
            subject: self.subject,
            top_k: self.top_k,
        }
    }
}
