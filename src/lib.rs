//! # Hamo-UME
//!
//! Backend for a therapy chat product. Pro users (therapists) define
//! avatars and client profiles ("AI Minds"); clients chat with an avatar
//! whose replies are steered by the PSVS state engine.
//!
//! Every user message is scored for five behavioural indicators, which move
//! the client's stress level and energy state. The resulting position is
//! rendered into a system prompt for the completion model.
//!
//! - [`psvs`] - pure state engine (indicators, classifier, stress, estimator, trajectory)
//! - [`prompt`] - system prompt composer
//! - [`llms`] - completion service trait and the Gemini backend
//! - [`store`] - repository trait with in-memory and SQLite backends
//! - [`chat`] - conversation pipeline tying the above together
//! - [`server`] - axum HTTP surface
//! - [`config`] - YAML + environment configuration

pub mod chat;
pub mod config;
pub mod llms;
pub mod prompt;
pub mod psvs;
pub mod server;
pub mod store;

pub use chat::{ChatError, ChatService, ChatSettings};
pub use config::AppConfig;
pub use llms::{CompletionService, GeminiCompletion};
pub use psvs::{EnergyState, PsvsPosition, PsvsTrajectory, Quadrant};
pub use store::Store;

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
