//! PSVS (Position / Stress / Value / Search) state engine.
//!
//! The engine models a client as a point on two personality axes
//! (introvert–extrovert, emotional–rational) plus a stress level. The sign of
//! the axes selects one of four [`Quadrant`]s; stress selects one of three
//! [`EnergyState`]s and a normalized distance from the homeostatic center.
//!
//! Data flow:
//!
//! ```text
//! PersonalityProfile --estimator--> PsvsTrajectory (seed)
//! message --indicators--> IndicatorScores --stress--> new stress
//!         --classifier--> energy state / distance --> appended position
//! ```
//!
//! Everything in this module is pure. Persistence and serialization of
//! concurrent updates live in [`crate::store`] and [`crate::chat`].

pub mod classifier;
pub mod config;
pub mod estimator;
pub mod indicators;
pub mod profile;
pub mod stress;
pub mod trajectory;
pub mod types;

pub use estimator::estimate;
pub use indicators::{extract, should_skip_psvs_update};
pub use profile::{
    AttachmentStyle, CognitionBeliefs, EmotionPattern, PersonalityCharacteristics,
    PersonalityProfile, RelationshipPattern,
};
pub use trajectory::PsvsTrajectory;
pub use types::{EnergyState, IndicatorScores, PsvsPosition, Quadrant};
