use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A message as sent to the chat completions endpoint.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("No model selected")]
    NoModel,

    #[error("Missing API key for the completion service")]
    MissingApiKey,

    #[error("Completion request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed completion chunk: {0}")]
    MalformedChunk(String),
}

/// Incremental text fragments of a streamed completion, pulled by a
/// single consumer.
pub type FragmentStream = BoxStream<'static, Result<String, CompletionError>>;

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, CompletionError>;
}

/// Client for an OpenAI compatible chat completions API (Groq by
/// default).
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    api_hostname: String,
    api_key: String,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(api_hostname: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(60 * 5),
        }
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn stream(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<FragmentStream, CompletionError> {
        if self.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }
        let payload = json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        let url = format!("{}/v1/chat/completions", self.api_hostname);
        tracing::debug!("Requesting streamed completion from {} with model {}", url, model);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(fragments(response.bytes_stream()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    #[serde(default)]
    delta: Delta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<CompletionChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEvent {
    error: ProviderErrorBody,
}

/// What a single SSE `data:` payload means for the consumer.
#[derive(Debug, PartialEq)]
enum Event {
    Fragment(String),
    Empty,
    Done,
}

fn parse_event(data: &str) -> Result<Event, CompletionError> {
    if data == "[DONE]" {
        return Ok(Event::Done);
    }
    match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => {
            // Each chunk carries at most one content delta
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|c| !c.is_empty());
            Ok(content.map(Event::Fragment).unwrap_or(Event::Empty))
        }
        Err(e) => {
            if let Ok(err) = serde_json::from_str::<ProviderErrorEvent>(data) {
                return Err(CompletionError::Provider(err.error.message));
            }
            tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e);
            Err(CompletionError::MalformedChunk(e.to_string()))
        }
    }
}

/// Events of one SSE block, one per `data:` line.
fn parse_block(block: &[u8]) -> Result<Vec<Event>, CompletionError> {
    let block =
        std::str::from_utf8(block).map_err(|e| CompletionError::MalformedChunk(e.to_string()))?;
    let mut events = Vec::new();
    for line in block.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        events.push(parse_event(data)?);
    }
    Ok(events)
}

/// Turns an SSE response body into a stream of content fragments.
fn fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CompletionError> + Send + 'static,
{
    let mut bytes = Box::pin(bytes);

    Box::pin(async_stream::try_stream! {
        // Raw bytes since frames can end inside a multibyte character.
        // Only complete events are decoded.
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        'outer: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::<CompletionError>::into)?;
            buffer.extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r'));

            while let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
                let block: Vec<u8> = buffer.drain(..event_end + 2).collect();
                for event in parse_block(&block)? {
                    match event {
                        Event::Fragment(text) => yield text,
                        Event::Empty => {}
                        Event::Done => {
                            done = true;
                            break 'outer;
                        }
                    }
                }
            }
        }

        if !done && !buffer.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!("Completion stream ended inside an event, flushing it");
            for event in parse_block(&buffer)? {
                if let Event::Fragment(text) = event {
                    yield text;
                }
            }
        }
    })
}
