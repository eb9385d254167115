//! Conversation pipeline.
//!
//! ```text
//! User message
//!   → validate (session active, mind and avatar present)
//!   → extract indicators (skipped for acknowledgements)
//!   → advance trajectory, compare-and-swap with retries
//!   → compose system prompt from the committed position
//!   → completion call under a timeout (fallback reply on failure)
//!   → persist both messages, bump the session counter
//! ```
//!
//! The trajectory write is committed before the completion call, so a
//! failed or slow model never loses the position update.

pub mod service;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::psvs::{IndicatorScores, PersonalityProfile, PsvsPosition};
use crate::store::{FeedbackEmotion, StoreError};

pub use service::{blocking, ChatService};

// ============================================================================
// Settings
// ============================================================================

pub const DEFAULT_COMPLETION_TIMEOUT_SECS: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Upper bound on one completion call, in seconds.
    pub completion_timeout_secs: f64,
    /// Compare-and-swap attempts per message before giving up.
    pub max_update_retries: u32,
    /// Prior messages loaded as completion history.
    pub history_window: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            completion_timeout_secs: DEFAULT_COMPLETION_TIMEOUT_SECS,
            max_update_retries: 5,
            history_window: 10,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Ended sessions accept no further messages.
    #[error("session {0} has ended")]
    SessionEnded(String),

    /// Retries exhausted on a contended trajectory. Transient.
    #[error("concurrent update conflict on mind {mind_id} after {attempts} attempts")]
    Conflict { mind_id: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A blocking store task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

// ============================================================================
// Requests and results
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewAvatar {
    pub pro_user_id: String,
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub therapeutic_approaches: Vec<String>,
    #[serde(default)]
    pub about: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMind {
    pub pro_user_id: String,
    pub avatar_id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub therapy_principles: String,
    #[serde(default)]
    pub profile: PersonalityProfile,
}

/// Partial edit of an avatar. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarUpdate {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub therapeutic_approaches: Option<Vec<String>>,
    pub about: Option<String>,
}

/// Partial edit of a mind. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MindUpdate {
    pub name: Option<String>,
    pub goals: Option<String>,
    pub therapy_principles: Option<String>,
    pub profile: Option<PersonalityProfile>,
}

/// Post-session feedback as submitted by the client. Scores are 0-10.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub user_id: String,
    pub session_id: String,
    pub being_energy_level: f64,
    pub being_physical_comfort: f64,
    #[serde(default)]
    pub being_description: Option<String>,
    pub feeling_primary_emotion: FeedbackEmotion,
    pub feeling_intensity: f64,
    #[serde(default)]
    pub feeling_description: Option<String>,
    pub knowing_clarity: f64,
    #[serde(default)]
    pub knowing_insights: Vec<String>,
    #[serde(default)]
    pub knowing_description: Option<String>,
    pub overall_rating: f64,
}

/// Outcome of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnResult {
    pub session_id: String,
    pub reply: String,
    /// Committed position after this message.
    pub position: PsvsPosition,
    /// `None` when the message was too short to score.
    pub indicators: Option<IndicatorScores>,
    pub psvs_updated: bool,
    pub fallback_used: bool,
    pub message_count: u64,
}
