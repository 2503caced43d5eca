//! AI provider client contract.
//!
//! # Responsibility
//! - Define the chat request shape shared by every provider.
//! - Expose an async `AiProvider` seam so services can be tested without
//!   network access.
//!
//! # Invariants
//! - Providers return trimmed text.
//! - A provider that is not configured fails fast with `NotConfigured`
//!   before any network call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cache;
pub mod client;
pub mod parse;
pub mod prompts;

pub use cache::{weak_hash, ResponseCache};
pub use client::HttpAiClient;
pub use parse::{parse_task_suggestions, strip_code_fences, TaskSuggestion};

pub type AiResult<T> = Result<T, AiError>;

/// Errors from AI provider calls.
#[derive(Debug)]
pub enum AiError {
    /// Missing API key, base URL or model.
    NotConfigured,
    Http(reqwest::Error),
    /// Provider answered with a non-success status.
    Status { status: u16, body: String },
    /// Response body did not have the expected shape.
    InvalidResponse(String),
    /// Model output could not be turned into the requested structure.
    Parse(String),
}

impl Display for AiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "AI provider is not configured"),
            Self::Http(err) => write!(f, "AI request failed: {err}"),
            Self::Status { status, body } => write!(f, "AI provider error {status}: {body}"),
            Self::InvalidResponse(message) => write!(f, "unexpected AI response: {message}"),
            Self::Parse(message) => write!(f, "could not parse AI output: {message}"),
        }
    }
}

impl Error for AiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Provider-neutral chat completion request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// System messages joined, for providers that take them out of band.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|message| message.role == ChatRole::System)
            .map(|message| message.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Chat completion backend.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Buffered completion.
    async fn complete(&self, request: &ChatRequest) -> AiResult<String>;

    /// Streamed completion. `on_delta` receives each text fragment as it
    /// arrives; the full text is returned at the end.
    async fn stream(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> AiResult<String>;
}

/// Streams into `on_delta` when given, otherwise runs a buffered completion.
pub async fn run_chat<P: AiProvider + ?Sized>(
    provider: &P,
    request: &ChatRequest,
    on_delta: Option<&mut (dyn for<'d> FnMut(&'d str) + Send)>,
) -> AiResult<String> {
    match on_delta {
        Some(on_delta) => provider.stream(request, on_delta).await,
        None => provider.complete(request).await,
    }
}
