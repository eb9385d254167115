//! PSVS value types: quadrants, energy states, positions and indicator scores.
//!
//! A [`PsvsPosition`] is a point-in-time snapshot. Only the two personality
//! axes and the stress level are stored inputs; quadrant, energy state and
//! distance from center are always derived from them, both on construction
//! and on deserialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier;

// ============================================================================
// Quadrant
// ============================================================================

/// One of four personality archetypes derived from the sign of the two axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// Introvert + rational.
    Expert,
    /// Introvert + emotional.
    Supporter,
    /// Extrovert + rational.
    Leader,
    /// Extrovert + emotional.
    Dreamer,
}

impl Quadrant {
    /// All quadrants in canonical order.
    pub const ALL: [Quadrant; 4] = [
        Self::Expert,
        Self::Supporter,
        Self::Leader,
        Self::Dreamer,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Supporter => "supporter",
            Self::Leader => "leader",
            Self::Dreamer => "dreamer",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quadrant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expert" => Ok(Self::Expert),
            "supporter" => Ok(Self::Supporter),
            "leader" => Ok(Self::Leader),
            "dreamer" => Ok(Self::Dreamer),
            other => Err(format!("unknown quadrant '{}'", other)),
        }
    }
}

// ============================================================================
// Energy state
// ============================================================================

/// Three-band classification of stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyState {
    /// Homeostatic balance (stress < 4.0).
    Positive,
    /// Instability (4.0 <= stress < 7.0).
    Negative,
    /// Crisis (stress >= 7.0).
    Neurotic,
}

impl EnergyState {
    pub const ALL: [EnergyState; 3] = [Self::Positive, Self::Negative, Self::Neurotic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neurotic => "neurotic",
        }
    }
}

impl fmt::Display for EnergyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Indicator scores
// ============================================================================

/// Per-message lexical signal, one non-negative score per category.
///
/// Serialized with the single-letter keys used throughout the PSVS
/// literature (`A`, `W`, `E`, `H`, `B`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorScores {
    /// Forward-looking, responsibility-taking phrasing.
    #[serde(rename = "A")]
    pub agency: f64,
    /// Avoidance and apathy.
    #[serde(rename = "W")]
    pub withdrawal: f64,
    /// Absolutist, all-or-nothing language.
    #[serde(rename = "E")]
    pub extremity: f64,
    /// Coercion, threats, insults.
    #[serde(rename = "H")]
    pub hostility: f64,
    /// Respectful, clarifying phrasing.
    #[serde(rename = "B")]
    pub boundary: f64,
}

impl IndicatorScores {
    /// Upper bound applied independently to every category.
    pub const CAP: f64 = 3.0;

    pub fn zero() -> Self {
        Self::default()
    }

    /// True when every category scored zero.
    pub fn is_zero(&self) -> bool {
        self.agency == 0.0
            && self.withdrawal == 0.0
            && self.extremity == 0.0
            && self.hostility == 0.0
            && self.boundary == 0.0
    }

    /// Clamp each category to `[0, CAP]`.
    pub fn capped(self) -> Self {
        let cap = |v: f64| v.clamp(0.0, Self::CAP);
        Self {
            agency: cap(self.agency),
            withdrawal: cap(self.withdrawal),
            extremity: cap(self.extremity),
            hostility: cap(self.hostility),
            boundary: cap(self.boundary),
        }
    }
}

// ============================================================================
// Position
// ============================================================================

/// Point-in-time PSVS snapshot.
///
/// Fields are private so that `quadrant`, `energy_state` and
/// `distance_from_center` can only come from [`PsvsPosition::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PositionRecord")]
pub struct PsvsPosition {
    quadrant: Quadrant,
    energy_state: EnergyState,
    rational_emotional: f64,
    intro_extro: f64,
    distance_from_center: f64,
    stress_level: f64,
    timestamp: DateTime<Utc>,
}

impl PsvsPosition {
    /// Build a position from its independent inputs.
    ///
    /// Axes are clamped to `[-1, 1]` and stress to `[0, 10]` before the
    /// derived fields are computed.
    pub fn new(
        intro_extro: f64,
        rational_emotional: f64,
        stress_level: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let intro_extro = intro_extro.clamp(-1.0, 1.0);
        let rational_emotional = rational_emotional.clamp(-1.0, 1.0);
        let stress_level = stress_level.clamp(0.0, 10.0);
        let (energy_state, distance_from_center) = classifier::derive(stress_level);

        Self {
            quadrant: classifier::quadrant(intro_extro, rational_emotional),
            energy_state,
            rational_emotional,
            intro_extro,
            distance_from_center,
            stress_level,
            timestamp,
        }
    }

    /// Same personality axes, new stress level.
    pub fn with_stress(&self, stress_level: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(self.intro_extro, self.rational_emotional, stress_level, timestamp)
    }

    pub fn quadrant(&self) -> Quadrant {
        self.quadrant
    }

    pub fn energy_state(&self) -> EnergyState {
        self.energy_state
    }

    pub fn rational_emotional(&self) -> f64 {
        self.rational_emotional
    }

    pub fn intro_extro(&self) -> f64 {
        self.intro_extro
    }

    pub fn distance_from_center(&self) -> f64 {
        self.distance_from_center
    }

    pub fn stress_level(&self) -> f64 {
        self.stress_level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Persisted shape of a position. Derived fields present in stored JSON are
/// ignored and recomputed.
#[derive(Deserialize)]
struct PositionRecord {
    #[serde(default)]
    rational_emotional: f64,
    #[serde(default)]
    intro_extro: f64,
    stress_level: f64,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
}

impl From<PositionRecord> for PsvsPosition {
    fn from(r: PositionRecord) -> Self {
        PsvsPosition::new(r.intro_extro, r.rational_emotional, r.stress_level, r.timestamp)
    }
}

// ============================================================================
// Tests
// ============================================================================
