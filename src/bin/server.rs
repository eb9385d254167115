//! hamo-ume HTTP server binary.
//!
//! Starts an axum HTTP server exposing the avatar, mind, session and chat
//! endpoints.
//!
//! # Environment Variables
//!
//! - `PORT` - HTTP port (default: 8080)
//! - `HAMO_STORE` - Storage backend: "memory" (default) or "sqlite"
//! - `HAMO_SQLITE_PATH` - SQLite database file (default: `data/hamo.db`)
//! - `GEMINI_API_KEY` - Completion credentials (replies fall back without it)
//! - `RUST_LOG` - Tracing filter (default: "info,hamo_ume=debug")
//!
//! See [`hamo_ume::config`] for the full list.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! # or persistent:
//! HAMO_STORE=sqlite cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;

use hamo_ume::chat::ChatService;
use hamo_ume::config::{AppConfig, StoreBackend};
use hamo_ume::llms::GeminiCompletion;
use hamo_ume::server::{app_router, AppState};
use hamo_ume::store::{MemoryStore, SqliteStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hamo_ume=debug".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let bind_addr = format!("0.0.0.0:{}", config.port);

    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sqlite => {
            tracing::info!("Opening SQLite store at {}", config.sqlite_path.display());
            Arc::new(
                SqliteStore::open(&config.sqlite_path)
                    .with_context(|| format!("Failed to open {}", config.sqlite_path.display()))?,
            )
        }
    };

    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; every reply will use the fallback message");
    }
    let completion = GeminiCompletion::new(config.gemini.clone())
        .context("Failed to build completion client")?;
    tracing::info!("Completion model: {}", config.gemini.model);

    let service = ChatService::new(store, Arc::new(completion), config.chat.clone());
    let app = app_router(AppState::new(service));

    tracing::info!("hamo-ume server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                        - liveness check");
    tracing::info!("  POST /api/v1/avatars                - create avatar");
    tracing::info!("  POST /api/v1/minds                  - create AI mind (seeds PSVS)");
    tracing::info!("  GET  /api/v1/minds/{{id}}/psvs        - PSVS trajectory");
    tracing::info!("  POST /api/v1/sessions               - start session");
    tracing::info!("  POST /api/v1/sessions/{{id}}/messages - chat turn");
    tracing::info!("  POST /api/v1/feedback/session       - post-session feedback");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
