//! Per-client position history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::config::MAX_TRAJECTORY_HISTORY;
use super::stress;
use super::types::{IndicatorScores, PsvsPosition};

/// Current position plus a bounded, time-ordered history.
///
/// The history always ends with `current` and never holds more than
/// [`MAX_TRAJECTORY_HISTORY`] entries; the oldest are evicted first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsvsTrajectory {
    current: PsvsPosition,
    history: VecDeque<PsvsPosition>,
}

impl PsvsTrajectory {
    /// Start a trajectory at an estimated position.
    pub fn seed(position: PsvsPosition) -> Self {
        let mut history = VecDeque::with_capacity(MAX_TRAJECTORY_HISTORY);
        history.push_back(position.clone());
        Self {
            current: position,
            history,
        }
    }

    pub fn current(&self) -> &PsvsPosition {
        &self.current
    }

    /// Oldest first.
    pub fn history(&self) -> &VecDeque<PsvsPosition> {
        &self.history
    }

    /// Make `position` current and append it, evicting the oldest entry
    /// when the history is full.
    pub fn push(&mut self, position: PsvsPosition) {
        while self.history.len() >= MAX_TRAJECTORY_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(position.clone());
        self.current = position;
    }

    /// Apply one message's indicators and append exactly one new position.
    ///
    /// Personality axes (and so the quadrant) stay fixed; only stress and
    /// its derived fields move.
    pub fn advance(&mut self, indicators: &IndicatorScores, now: DateTime<Utc>) -> &PsvsPosition {
        let stress = stress::update(
            self.current.stress_level(),
            indicators,
            self.current.quadrant(),
        );
        let next = self.current.with_stress(stress, now);
        self.push(next);
        &self.current
    }
}

#[derive(Deserialize)]
struct TrajectoryRecord {
    current: PsvsPosition,
    #[serde(default)]
    history: Vec<PsvsPosition>,
}

impl<'de> Deserialize<'de> for PsvsTrajectory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = TrajectoryRecord::deserialize(deserializer)?;
        let skip = record.history.len().saturating_sub(MAX_TRAJECTORY_HISTORY);
        let mut history: VecDeque<PsvsPosition> =
            record.history.into_iter().skip(skip).collect();

        // The newest history entry is always the current position.
        if history.back() != Some(&record.current) {
            if history.len() >= MAX_TRAJECTORY_HISTORY {
                history.pop_front();
            }
            history.push_back(record.current.clone());
        }
        Ok(Self {
            current: record.current,
            history,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psvs::types::{EnergyState, Quadrant};

    fn seeded(stress: f64) -> PsvsTrajectory {
        PsvsTrajectory::seed(PsvsPosition::new(-0.5, 0.4, stress, Utc::now()))
    }

    #[test]
    fn test_seed_history_contains_seed() {
        let t = seeded(2.0);
        assert_eq!(t.history().len(), 1);
        assert_eq!(t.history()[0], *t.current());
    }

    #[test]
    fn test_advance_appends_exactly_one() {
        let mut t = seeded(5.0);
        let agency = IndicatorScores {
            agency: 1.0,
            ..Default::default()
        };
        let stress = t.advance(&agency, Utc::now()).stress_level();
        assert!((stress - 4.0).abs() < 1e-9);
        assert_eq!(t.history().len(), 2);
        assert_eq!(t.history().back(), Some(t.current()));
    }

    #[test]
    fn test_advance_keeps_axes_and_quadrant() {
        let mut t = seeded(1.0);
        let hostile = IndicatorScores {
            hostility: 3.0,
            extremity: 3.0,
            ..Default::default()
        };
        let before = t.current().clone();
        t.advance(&hostile, Utc::now());
        let after = t.current();
        assert_eq!(after.quadrant(), Quadrant::Expert);
        assert_eq!(after.intro_extro(), before.intro_extro());
        assert_eq!(after.rational_emotional(), before.rational_emotional());
        assert_eq!(after.energy_state(), EnergyState::Neurotic);
    }

    #[test]
    fn test_history_capped_fifo() {
        let mut t = seeded(0.0);
        for i in 1..=120 {
            t.push(PsvsPosition::new(-0.5, 0.4, (i % 10) as f64, Utc::now()));
            assert!(t.history().len() <= MAX_TRAJECTORY_HISTORY);
        }
        assert_eq!(t.history().len(), MAX_TRAJECTORY_HISTORY);
        // Entries 71..=120 survive, oldest first.
        assert_eq!(t.history().front().map(|p| p.stress_level()), Some(1.0));
        assert_eq!(t.history().back().map(|p| p.stress_level()), Some(0.0));
    }

    #[test]
    fn test_deserialize_trims_oversized_history() {
        let positions: Vec<PsvsPosition> = (0..60)
            .map(|i| PsvsPosition::new(0.1, 0.1, (i % 10) as f64, Utc::now()))
            .collect();
        let json = serde_json::json!({
            "current": positions[59],
            "history": positions,
        });
        let t: PsvsTrajectory = serde_json::from_value(json).unwrap();
        assert_eq!(t.history().len(), MAX_TRAJECTORY_HISTORY);
        assert_eq!(t.history().front().map(|p| p.stress_level()), Some(0.0));
    }

    #[test]
    fn test_deserialize_appends_current_missing_from_history() {
        let positions: Vec<PsvsPosition> = (0..MAX_TRAJECTORY_HISTORY)
            .map(|i| PsvsPosition::new(0.1, 0.1, (i % 10) as f64, Utc::now()))
            .collect();
        let current = PsvsPosition::new(0.1, 0.1, 7.5, Utc::now());
        let json = serde_json::json!({ "current": current, "history": positions });

        let t: PsvsTrajectory = serde_json::from_value(json).unwrap();
        assert_eq!(t.history().len(), MAX_TRAJECTORY_HISTORY);
        assert_eq!(t.history().back(), Some(t.current()));
        assert_eq!(t.current().stress_level(), 7.5);
        assert_eq!(t.history().front().map(|p| p.stress_level()), Some(1.0));

        let short = serde_json::json!({ "current": current, "history": [positions[0]] });
        let t: PsvsTrajectory = serde_json::from_value(short).unwrap();
        assert_eq!(t.history().len(), 2);
        assert_eq!(t.history().back(), Some(t.current()));
    }

    #[test]
    fn test_deserialize_without_history_seeds() {
        let current = PsvsPosition::new(0.1, 0.1, 3.0, Utc::now());
        let json = serde_json::json!({ "current": current });
        let t: PsvsTrajectory = serde_json::from_value(json).unwrap();
        assert_eq!(t.history().len(), 1);
    }
}
