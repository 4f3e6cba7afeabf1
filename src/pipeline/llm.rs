//! Completion client: build the two-message prompt and call the provider.
//!
//! Transport lives behind [`ChatBackend`] so the controller can be driven by
//! any OpenAI-compatible endpoint, or by a stub in tests. This module only
//! shapes the request and validates the answer; there is no retry, no
//! streaming and no tool calling. A failed call surfaces immediately.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::output::{CompletionResult, TokenUsage};
use crate::prompts::user_message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// What the backend sends on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// What the backend hands back, already normalised.
///
/// `content` is `None` when the provider returned no choice or a `null`
/// message; usage counters the provider left out are already 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub usage: TokenUsage,
}

/// A chat-completion transport.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Issue one completion call.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}

/// Input of one completion: instruction, document text, optional extra text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    instruction: String,
    document_text: String,
    auxiliary_message: Option<String>,
}

impl CompletionRequest {
    /// Build a request. A blank instruction is rejected; a blank auxiliary
    /// message is dropped and its surrounding whitespace trimmed.
    pub fn new(
        instruction: impl Into<String>,
        document_text: impl Into<String>,
        auxiliary_message: Option<&str>,
    ) -> Result<Self, AgentError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(AgentError::EmptyInstruction);
        }
        Ok(Self {
            instruction,
            document_text: document_text.into(),
            auxiliary_message: auxiliary_message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        })
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn document_text(&self) -> &str {
        &self.document_text
    }

    pub fn auxiliary_message(&self) -> Option<&str> {
        self.auxiliary_message.as_deref()
    }

    /// The exact two messages sent to the provider.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.instruction.as_str()),
            ChatMessage::user(user_message(
                &self.document_text,
                self.auxiliary_message.as_deref(),
            )),
        ]
    }

    /// Wrap the messages with the configured model and temperature.
    pub fn to_chat_request(&self, config: &AgentConfig) -> ChatRequest {
        ChatRequest {
            model: config.model.clone(),
            messages: self.messages(),
            temperature: config.temperature,
        }
    }
}

/// Run one completion.
///
/// # Errors
/// - [`AgentError::NoResponse`] when the provider returned no content
/// - whatever the backend reports for transport, auth or API failures
pub async fn complete(
    backend: &dyn ChatBackend,
    config: &AgentConfig,
    request: &CompletionRequest,
) -> Result<CompletionResult, AgentError> {
    let start = Instant::now();
    let chat_request = request.to_chat_request(config);
    info!(
        "Requesting completion from {} ({} document chars)",
        chat_request.model,
        request.document_text.chars().count()
    );

    let response = backend.chat(&chat_request).await?;
    let content = response
        .content
        .filter(|c| !c.is_empty())
        .ok_or(AgentError::NoResponse)?;

    debug!(
        "Completion: {} prompt tokens, {} completion tokens, {:?}",
        response.usage.prompt_tokens,
        response.usage.completion_tokens,
        start.elapsed()
    );

    Ok(CompletionResult {
        content,
        usage: response.usage,
    })
}
