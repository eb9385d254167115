//! Client psychological profile ("AI Mind" intake data).
//!
//! Every sub-section is optional and every field has a default, so partial
//! intake data always deserializes.

use serde::{Deserialize, Serialize};

/// Attachment style from the relationship section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStyle {
    #[default]
    Secure,
    Anxious,
    Avoidant,
    Disorganized,
}

/// Trait tags and free-text description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityCharacteristics {
    /// Free-form tags such as "introvert" or "analytical".
    pub primary_traits: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionPattern {
    pub dominant_emotions: Vec<String>,
    pub triggers: Vec<String>,
    pub coping_mechanisms: Vec<String>,
    /// 0–1; treated as 0.5 when absent.
    pub emotional_stability: Option<f64>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitionBeliefs {
    pub core_beliefs: Vec<String>,
    pub cognitive_distortions: Vec<String>,
    pub thinking_patterns: Vec<String>,
    pub self_perception: String,
    pub world_perception: String,
    pub future_perception: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipPattern {
    pub attachment_style: AttachmentStyle,
    pub relationship_patterns: Vec<String>,
    pub communication_style: String,
    /// 0–1; treated as 0.5 when absent.
    pub trust_level: Option<f64>,
    /// 0–1.
    pub intimacy_comfort: Option<f64>,
}

/// Complete intake profile authored by the therapist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityProfile {
    pub personality: Option<PersonalityCharacteristics>,
    pub emotion_pattern: Option<EmotionPattern>,
    pub cognition_beliefs: Option<CognitionBeliefs>,
    #[serde(alias = "relationship_manipulations")]
    pub relationship: Option<RelationshipPattern>,
}
