//! Position classifier: total functions from axes and stress to the
//! discrete PSVS taxonomy.

use super::config::{
    MAX_STRESS, STRESS_THRESHOLD_NEGATIVE_TO_NEUROTIC, STRESS_THRESHOLD_POSITIVE_TO_NEGATIVE,
};
use super::types::{EnergyState, Quadrant};

/// Sign-based 2×2 lookup. Zero on either axis falls on the
/// introvert/emotional side; the exact origin (no axis evidence at all) is
/// the default `Expert` quadrant.
pub fn quadrant(intro_extro: f64, rational_emotional: f64) -> Quadrant {
    if intro_extro == 0.0 && rational_emotional == 0.0 {
        return Quadrant::Expert;
    }

    let is_extrovert = intro_extro > 0.0;
    let is_rational = rational_emotional > 0.0;

    match (is_extrovert, is_rational) {
        (true, true) => Quadrant::Leader,
        (true, false) => Quadrant::Dreamer,
        (false, true) => Quadrant::Expert,
        (false, false) => Quadrant::Supporter,
    }
}

/// `< 4.0` positive, `[4.0, 7.0)` negative, `>= 7.0` neurotic.
pub fn energy_state(stress_level: f64) -> EnergyState {
    if stress_level < STRESS_THRESHOLD_POSITIVE_TO_NEGATIVE {
        EnergyState::Positive
    } else if stress_level < STRESS_THRESHOLD_NEGATIVE_TO_NEUROTIC {
        EnergyState::Negative
    } else {
        EnergyState::Neurotic
    }
}

/// Normalized distance from the homeostatic center: `min(stress / 10, 1)`.
pub fn distance_from_center(stress_level: f64) -> f64 {
    (stress_level / MAX_STRESS).min(1.0)
}

/// Both stress-derived fields at once. Every position goes through here.
pub fn derive(stress_level: f64) -> (EnergyState, f64) {
    (energy_state(stress_level), distance_from_center(stress_level))
}
