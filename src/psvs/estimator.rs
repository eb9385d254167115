//! Initial position estimator.
//!
//! Runs once per client profile and seeds the trajectory. Absent profile
//! sections contribute nothing; absent scalars inside a present section
//! default to 0.5.

use chrono::{DateTime, Utc};

use super::config::{BASELINE_STRESS, MAX_STRESS};
use super::profile::{
    AttachmentStyle, CognitionBeliefs, EmotionPattern, PersonalityCharacteristics,
    PersonalityProfile, RelationshipPattern,
};
use super::types::PsvsPosition;

const TRAIT_INTRO_EXTRO: f64 = 0.5;
const TRAIT_RATIONAL_EMOTIONAL: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.3;

const RATIONAL_KEYWORDS: &[&str] = &["analytical", "rational", "logical"];
const EMOTIONAL_KEYWORDS: &[&str] = &["creative", "emotional", "feeling"];
const NEGATIVE_SELF_KEYWORDS: &[&str] = &["negative", "bad", "worthless", "failure"];

const DEFAULT_SCALAR: f64 = 0.5;

/// Estimate the seed position for a profile, timestamped now.
pub fn estimate(profile: &PersonalityProfile) -> PsvsPosition {
    estimate_at(profile, Utc::now())
}

/// Estimate the seed position for a profile at a given instant.
pub fn estimate_at(profile: &PersonalityProfile, timestamp: DateTime<Utc>) -> PsvsPosition {
    let (intro_extro, rational_emotional) = parse_axes(profile.personality.as_ref());
    let stress = estimate_stress(profile);
    log::debug!(
        "Estimated initial PSVS: intro_extro={:.2} rational_emotional={:.2} stress={:.2}",
        intro_extro,
        rational_emotional,
        stress
    );
    PsvsPosition::new(intro_extro, rational_emotional, stress, timestamp)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Derive `(intro_extro, rational_emotional)` from trait tags and the
/// description, both clamped to `[-1, 1]`.
///
/// The tag pass and the description pass are additive.
pub fn parse_axes(personality: Option<&PersonalityCharacteristics>) -> (f64, f64) {
    let Some(personality) = personality else {
        return (0.0, 0.0);
    };

    let mut intro_extro = 0.0;
    let mut rational_emotional = 0.0;

    for tag in &personality.primary_traits {
        let tag = tag.to_lowercase();

        if tag.contains("introvert") {
            intro_extro -= TRAIT_INTRO_EXTRO;
        } else if tag.contains("extrovert") {
            intro_extro += TRAIT_INTRO_EXTRO;
        }

        if tag.contains("analytical") || tag.contains("rational") {
            rational_emotional += TRAIT_RATIONAL_EMOTIONAL;
        } else if tag.contains("creative") || tag.contains("emotional") {
            rational_emotional -= TRAIT_RATIONAL_EMOTIONAL;
        }
    }

    let description = personality.description.to_lowercase();
    if !description.is_empty() {
        if description.contains("introvert") {
            intro_extro -= DESCRIPTION_WEIGHT;
        }
        if description.contains("extrovert") {
            intro_extro += DESCRIPTION_WEIGHT;
        }
        if contains_any(&description, RATIONAL_KEYWORDS) {
            rational_emotional += DESCRIPTION_WEIGHT;
        }
        if contains_any(&description, EMOTIONAL_KEYWORDS) {
            rational_emotional -= DESCRIPTION_WEIGHT;
        }
    }

    (intro_extro.clamp(-1.0, 1.0), rational_emotional.clamp(-1.0, 1.0))
}

fn emotion_stress(emotion: &EmotionPattern) -> f64 {
    let mut stress = 0.0;
    for e in &emotion.dominant_emotions {
        stress += match e.trim().to_lowercase().as_str() {
            "anxiety" | "depression" | "fear" => 1.5,
            "anger" => 2.0,
            "sadness" => 1.0,
            _ => 0.0,
        };
    }
    let stability = emotion.emotional_stability.unwrap_or(DEFAULT_SCALAR);
    stress + (1.0 - stability) * 2.0
}

fn cognition_stress(cognition: &CognitionBeliefs) -> f64 {
    let mut stress = cognition.cognitive_distortions.len() as f64 * 0.5;
    if contains_any(&cognition.self_perception.to_lowercase(), NEGATIVE_SELF_KEYWORDS) {
        stress += 1.0;
    }
    stress
}

fn relationship_stress(relationship: &RelationshipPattern) -> f64 {
    let attachment = match relationship.attachment_style {
        AttachmentStyle::Anxious | AttachmentStyle::Disorganized => 1.5,
        AttachmentStyle::Avoidant => 1.0,
        AttachmentStyle::Secure => 0.0,
    };
    let trust = relationship.trust_level.unwrap_or(DEFAULT_SCALAR);
    attachment + (1.0 - trust) * 1.5
}

/// Baseline stress estimate in `[0, 10]`.
pub fn estimate_stress(profile: &PersonalityProfile) -> f64 {
    let stress = BASELINE_STRESS
        + profile.emotion_pattern.as_ref().map_or(0.0, emotion_stress)
        + profile.cognition_beliefs.as_ref().map_or(0.0, cognition_stress)
        + profile.relationship.as_ref().map_or(0.0, relationship_stress);

    stress.clamp(0.0, MAX_STRESS)
}

// ============================================================================
// Tests
// ============================================================================
