// Chat-completion client.
//
// Sends the whole message list in one POST and reads the first choice back.
// Results are forwarded as `LlmEvent`s over an mpsc channel for the app
// orchestrator to consume, tagged with the generation of the request.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use cramly_core::config::Config;
use cramly_core::model::Role;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Result of one spawned AI request, delivered to the app loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmEvent {
    Complete { text: String, generation: u64 },
    Error { message: String, generation: u64 },
}

impl LlmEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LlmEvent::Complete { generation, .. } | LlmEvent::Error { generation, .. } => {
                *generation
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Low-level chat-completion client.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl ChatClient {
    pub fn new(endpoint: String, api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.filter(|m| !m.is_empty()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `messages` and return the content of the first choice.
    pub async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: self.model.as_deref(),
            messages,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("AI request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("AI request failed with status {status}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("AI response was not valid JSON")?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("AI response contained no choices")?;

        debug!(chars = choice.message.content.len(), "AI response received");
        Ok(choice.message.content)
    }

    /// Run `complete` and report the outcome over `tx` as one `LlmEvent`.
    ///
    /// Returns when the event has been sent or the receiver is gone.
    pub async fn send(
        &self,
        messages: &[ChatMessage],
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) -> anyhow::Result<()> {
        let event = match self.complete(messages).await {
            Ok(text) => LlmEvent::Complete { text, generation },
            Err(e) => {
                warn!("AI request failed: {e:#}");
                LlmEvent::Error {
                    message: format!("{e:#}"),
                    generation,
                }
            }
        };
        let _ = tx.send(event).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured chat client or a stand-in that reports the missing
/// endpoint.
pub enum LlmClient {
    Active(ChatClient),
    Disabled,
}

impl LlmClient {
    /// `Active` when an endpoint is configured, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        if config.ai.endpoint.trim().is_empty() {
            return LlmClient::Disabled;
        }
        LlmClient::Active(ChatClient::new(
            config.ai.endpoint.clone(),
            config.credentials.ai_api_key.clone(),
            config.ai.model.clone(),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub async fn send(
        &self,
        messages: &[ChatMessage],
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) -> anyhow::Result<()> {
        match self {
            LlmClient::Active(client) => client.send(messages, tx, generation).await,
            LlmClient::Disabled => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: "AI endpoint not configured".to_string(),
                        generation,
                    })
                    .await;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
