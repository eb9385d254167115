//! Persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llms::Role;
use crate::prompt::{AvatarInfo, ProfileInfo};
use crate::psvs::{PersonalityProfile, PsvsPosition, PsvsTrajectory};

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A therapist persona owned by a pro user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: String,
    pub pro_user_id: String,
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub therapeutic_approaches: Vec<String>,
    #[serde(default)]
    pub about: String,
    pub created_at: DateTime<Utc>,
}

impl Avatar {
    pub fn info(&self) -> AvatarInfo {
        AvatarInfo {
            name: self.name.clone(),
            specialty: self.specialty.clone(),
            therapeutic_approaches: self.therapeutic_approaches.clone(),
            about: self.about.clone(),
        }
    }
}

/// A client profile ("AI Mind") authored by a pro user for one avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMind {
    pub id: String,
    /// The client this mind describes.
    #[serde(default)]
    pub user_id: String,
    pub avatar_id: String,
    /// The therapist who authored it; the only one allowed to edit it.
    pub pro_user_id: String,
    pub name: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub therapy_principles: String,
    #[serde(default)]
    pub profile: PersonalityProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AiMind {
    pub fn info(&self) -> ProfileInfo {
        ProfileInfo {
            name: self.name.clone(),
            goals: self.goals.clone(),
            therapy_principles: self.therapy_principles.clone(),
        }
    }
}

/// Versioned trajectory for one mind. `version` increases by one on every
/// successful compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsvsRecord {
    pub mind_id: String,
    pub trajectory: PsvsTrajectory,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub mind_id: String,
    pub avatar_id: String,
    #[serde(default)]
    pub user_id: String,
    pub message_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    /// Position after this message was processed (user messages only).
    #[serde(default)]
    pub psvs_snapshot: Option<PsvsPosition>,
    pub created_at: DateTime<Utc>,
}

/// Primary emotion a client reports after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackEmotion {
    Anxiety,
    Depression,
    Anger,
    Fear,
    Sadness,
    Joy,
    Neutral,
}

/// Post-session self-report on the Being / Feeling / Knowing dimensions.
/// Every score is on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFeedback {
    pub id: String,
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
    pub created_at: DateTime<Utc>,
}
