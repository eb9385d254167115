//! Stress update engine.
//!
//! ```text
//! S' = clamp(S + 0.9·W + 1.2·E + 1.6·H − 1.0·A − 1.1·B, 0, 10)
//! ```
//!
//! with indicators pre-scaled by the quadrant's modifiers.

use super::config::MAX_STRESS;
use super::types::{IndicatorScores, Quadrant};

pub const WEIGHT_WITHDRAWAL: f64 = 0.9;
pub const WEIGHT_EXTREMITY: f64 = 1.2;
pub const WEIGHT_HOSTILITY: f64 = 1.6;
pub const WEIGHT_AGENCY: f64 = 1.0;
pub const WEIGHT_BOUNDARY: f64 = 1.1;

/// Multiplicative per-indicator modifiers for one quadrant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadrantModifiers {
    pub agency: f64,
    pub withdrawal: f64,
    pub extremity: f64,
    pub hostility: f64,
    pub boundary: f64,
}

impl QuadrantModifiers {
    const NEUTRAL: Self = Self {
        agency: 1.0,
        withdrawal: 1.0,
        extremity: 1.0,
        hostility: 1.0,
        boundary: 1.0,
    };

    /// Modifier set for a quadrant. Indicators not listed pass through at 1.0.
    pub fn for_quadrant(quadrant: Quadrant) -> Self {
        match quadrant {
            Quadrant::Expert => Self {
                withdrawal: 1.2,
                hostility: 1.3,
                ..Self::NEUTRAL
            },
            Quadrant::Supporter => Self {
                withdrawal: 1.3,
                ..Self::NEUTRAL
            },
            Quadrant::Leader => Self {
                hostility: 1.2,
                agency: 1.2,
                ..Self::NEUTRAL
            },
            Quadrant::Dreamer => Self {
                extremity: 1.2,
                hostility: 1.2,
                boundary: 1.2,
                ..Self::NEUTRAL
            },
        }
    }

    fn apply(&self, s: &IndicatorScores) -> IndicatorScores {
        IndicatorScores {
            agency: s.agency * self.agency,
            withdrawal: s.withdrawal * self.withdrawal,
            extremity: s.extremity * self.extremity,
            hostility: s.hostility * self.hostility,
            boundary: s.boundary * self.boundary,
        }
    }
}

/// Signed stress change for one message, before clamping.
pub fn delta(indicators: &IndicatorScores, quadrant: Quadrant) -> f64 {
    let s = QuadrantModifiers::for_quadrant(quadrant).apply(indicators);

    WEIGHT_WITHDRAWAL * s.withdrawal + WEIGHT_EXTREMITY * s.extremity + WEIGHT_HOSTILITY * s.hostility
        - WEIGHT_AGENCY * s.agency
        - WEIGHT_BOUNDARY * s.boundary
}

/// Advance a stress level by one message's indicators.
pub fn update(current_stress: f64, indicators: &IndicatorScores, quadrant: Quadrant) -> f64 {
    (current_stress + delta(indicators, quadrant)).clamp(0.0, MAX_STRESS)
}
