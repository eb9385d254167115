//! HTTP server for the therapy chat backend.
//!
//! Thin JSON layer over [`crate::chat::ChatService`]; all business rules
//! live in the service.
//!
//! # Endpoints
//!
//! - `GET  /health` - Liveness check
//! - `/api/v1/avatars`, `/api/v1/minds`, `/api/v1/sessions` - see [`routes`]

pub mod routes;

pub use routes::{app_router, AppState};
