//! Completion service used to generate therapist replies.
//!
//! - [`CompletionService`] - the black-box contract the chat pipeline calls
//! - [`providers`] - concrete backends (Google Gemini)
//!
//! The chat pipeline never surfaces an [`LlmError`] to the end user; it logs
//! the failure and answers with [`FALLBACK_REPLY`] instead.

pub mod providers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use providers::gemini::{GeminiCompletion, GeminiSettings};

/// Degraded reply sent when the completion call fails or times out.
pub const FALLBACK_REPLY: &str = "I'm here to support you. I apologize, but I'm having trouble processing right now. Could you tell me more about what you're experiencing?";

// ---------------------------------------------------------------------------
// Conversation turns
// ---------------------------------------------------------------------------

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// One prior message passed to the completion service as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Completion failures. All of them are transient from the caller's view.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credentials configured.
    #[error("Gemini API key not set. Set GEMINI_API_KEY or GOOGLE_API_KEY.")]
    MissingApiKey,

    /// Connection, TLS or body-read failure.
    #[error("completion transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON shape.
    #[error("failed to parse completion response: {0}")]
    Parse(String),

    /// Response contained no usable text.
    #[error("completion response contained no text")]
    Empty,
}

// ---------------------------------------------------------------------------
// Service contract
// ---------------------------------------------------------------------------

/// Text-completion backend.
///
/// `history` is oldest-first and does not include `user_message`.
/// Implementations decide how much of it to forward.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> Result<String, LlmError>;

    /// Provider name for logs.
    fn provider(&self) -> &str;
}
