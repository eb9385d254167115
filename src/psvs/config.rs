//! PSVS constants and the static metadata tables used by the prompt renderers.
//!
//! Everything here is read-only configuration compiled into the binary.

use super::types::{EnergyState, Quadrant};

// ============================================================================
// Constants
// ============================================================================

/// Stress below this is `positive`.
pub const STRESS_THRESHOLD_POSITIVE_TO_NEGATIVE: f64 = 4.0;

/// Stress at or above this is `neurotic`.
pub const STRESS_THRESHOLD_NEGATIVE_TO_NEUROTIC: f64 = 7.0;

/// Upper bound of the stress scale.
pub const MAX_STRESS: f64 = 10.0;

/// Baseline stress before any profile evidence is applied.
pub const BASELINE_STRESS: f64 = 1.5;

/// Trajectory history keeps this many positions, oldest evicted first.
pub const MAX_TRAJECTORY_HISTORY: usize = 50;

/// Messages shorter than this (in characters, after trimming) never move
/// the position.
pub const MIN_MESSAGE_LENGTH_FOR_PSVS_UPDATE: usize = 3;

/// Acknowledgement-only replies that never move the position.
pub const SHORT_RESPONSES: &[&str] = &[
    "ok", "okay", "k", "yes", "no", "yeah", "nope", "yep", "sure", "fine", "good", "bad", "hi",
    "hello", "hey", "bye", "thanks", "好", "是", "不", "嗯", "哦", "谢谢", "再见",
];

// ============================================================================
// Homeostatic values
// ============================================================================

/// The four balanced states of the orange center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeostaticValue {
    Respect,
    Control,
    Appreciation,
    Recognition,
}

impl HomeostaticValue {
    /// Bilingual heading, e.g. `尊重 (Respect)`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Respect => "尊重 (Respect)",
            Self::Control => "掌控 (Control/Mastery)",
            Self::Appreciation => "欣赏 (Appreciation)",
            Self::Recognition => "认同 (Recognition)",
        }
    }

    pub fn zh(&self) -> &'static str {
        match self {
            Self::Respect => "尊重",
            Self::Control => "掌控",
            Self::Appreciation => "欣赏",
            Self::Recognition => "认同",
        }
    }
}

// ============================================================================
// Quadrant metadata
// ============================================================================

/// Static description of one quadrant.
#[derive(Debug)]
pub struct QuadrantProfile {
    pub name: &'static str,
    pub traits: &'static [&'static str],
    pub strengths: &'static [&'static str],
    pub challenges: &'static [&'static str],
    /// Label of the crisis pattern this quadrant collapses into.
    pub neurotic_pattern: &'static str,
}

static EXPERT: QuadrantProfile = QuadrantProfile {
    name: "专家型 (EXPERT)",
    traits: &["明晰事理来龙去脉", "答疑解惑获得尊重"],
    strengths: &["analytical", "fact-based", "prudent", "detail-oriented"],
    challenges: &["overthinking", "avoidance", "delay decision-making"],
    neurotic_pattern: "拖延症 - procrastination",
};

static SUPPORTER: QuadrantProfile = QuadrantProfile {
    name: "支持型 (SUPPORTER)",
    traits: &["实现他人的期望", "获得他人的认同"],
    strengths: &["supportive", "trusting", "empathetic", "collaborative"],
    challenges: &["people-pleasing", "self-erasing", "over-accommodation"],
    neurotic_pattern: "抑郁症 - depression from self-neglect",
};

static LEADER: QuadrantProfile = QuadrantProfile {
    name: "领导型 (LEADER)",
    traits: &["获得全程决断权力", "获得对事情的掌控"],
    strengths: &["decisive", "results-driven", "confident", "action-oriented"],
    challenges: &["domineering", "controlling", "my-way-or-highway"],
    neurotic_pattern: "躁狂症 - mania from over-control",
};

static DREAMER: QuadrantProfile = QuadrantProfile {
    name: "梦想型 (DREAMER)",
    traits: &["与人分享新奇特", "获得他人的欣赏"],
    strengths: &["inspiring", "enthusiastic", "creative", "visionary"],
    challenges: &["attention-seeking", "narcissistic", "boundary issues"],
    neurotic_pattern: "NPD - narcissistic personality disorder",
};

/// Metadata for a quadrant.
pub fn quadrant_profile(quadrant: Quadrant) -> &'static QuadrantProfile {
    match quadrant {
        Quadrant::Expert => &EXPERT,
        Quadrant::Supporter => &SUPPORTER,
        Quadrant::Leader => &LEADER,
        Quadrant::Dreamer => &DREAMER,
    }
}

// ============================================================================
// Energy-state metadata
// ============================================================================

/// Static description of one energy band.
#[derive(Debug)]
pub struct EnergyZone {
    pub zone: &'static str,
    pub color: &'static str,
    pub characteristics: &'static [&'static str],
    pub goal: &'static str,
}

static POSITIVE: EnergyZone = EnergyZone {
    zone: "正能态 (Homeostatic)",
    color: "橙色中心区域",
    characteristics: &["尊重", "掌控", "欣赏", "认同"],
    goal: "Maintain balance and stability",
};

static NEGATIVE: EnergyZone = EnergyZone {
    zone: "负能态 (Unstable)",
    color: "灰色中间区域",
    characteristics: &["懒散-逃避", "过敏-独断", "过敏-攻击", "过敏-默认"],
    goal: "Move toward positive zone through agency and boundaries",
};

static NEUROTIC: EnergyZone = EnergyZone {
    zone: "神经态 (Crisis)",
    color: "红色外围区域",
    characteristics: &["拖延症", "躁狂症", "抑郁症", "NPD"],
    goal: "Urgent intervention needed - restore to negative then positive",
};

/// Metadata for an energy state.
pub fn energy_zone(state: EnergyState) -> &'static EnergyZone {
    match state {
        EnergyState::Positive => &POSITIVE,
        EnergyState::Negative => &NEGATIVE,
        EnergyState::Neurotic => &NEUROTIC,
    }
}
