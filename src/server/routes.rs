//! Axum route handlers for the hamo-ume HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`                          - `{"status": "ok", "version", "service"}`
//! - `POST /api/v1/avatars`                  - Create an avatar
//! - `GET  /api/v1/avatars/{id}`             - Get an avatar
//! - `PUT  /api/v1/avatars/{id}`             - Owner-only edit
//! - `GET  /api/v1/avatars/{id}/minds`       - Minds created for an avatar
//! - `GET  /api/v1/pros/{pro_id}/avatars`    - Avatars owned by a pro
//! - `POST /api/v1/minds`                    - Create a mind and seed its PSVS trajectory
//! - `GET  /api/v1/minds/{id}`               - Get a mind
//! - `PUT  /api/v1/minds/{id}`               - Owner-only edit
//! - `GET  /api/v1/minds/{id}/psvs`          - Current position and history
//! - `GET  /api/v1/minds/{id}/sessions`      - Sessions for a mind
//! - `POST /api/v1/sessions`                 - Start a session
//! - `GET  /api/v1/sessions/{id}`            - Get a session
//! - `POST /api/v1/sessions/{id}/end`        - End a session
//! - `GET  /api/v1/sessions/{id}/messages`   - Conversation so far
//! - `POST /api/v1/sessions/{id}/messages`   - Chat turn
//! - `POST /api/v1/feedback/session`         - Post-session feedback
//! - `GET  /api/v1/feedback/{user_id}`       - A client's feedback history

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat::{
    blocking, AvatarUpdate, ChatError, ChatService, ChatTurnResult, MindUpdate, NewAvatar,
    NewFeedback, NewMind,
};
use crate::psvs::PsvsPosition;
use crate::store::{
    AiMind, Avatar, ConversationMessage, ConversationSession, PsvsRecord, SessionFeedback,
};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
}

impl AppState {
    pub fn new(service: ChatService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/avatars", post(create_avatar_handler))
        .route(
            "/api/v1/avatars/{id}",
            get(get_avatar_handler).put(update_avatar_handler),
        )
        .route("/api/v1/avatars/{id}/minds", get(list_minds_handler))
        .route("/api/v1/pros/{pro_id}/avatars", get(list_avatars_handler))
        .route("/api/v1/minds", post(create_mind_handler))
        .route(
            "/api/v1/minds/{id}",
            get(get_mind_handler).put(update_mind_handler),
        )
        .route("/api/v1/minds/{id}/psvs", get(get_psvs_handler))
        .route("/api/v1/minds/{id}/sessions", get(list_sessions_handler))
        .route("/api/v1/sessions", post(start_session_handler))
        .route("/api/v1/sessions/{id}", get(get_session_handler))
        .route("/api/v1/sessions/{id}/end", post(end_session_handler))
        .route(
            "/api/v1/sessions/{id}/messages",
            get(list_messages_handler).post(send_message_handler),
        )
        .route("/api/v1/feedback/session", post(submit_feedback_handler))
        .route("/api/v1/feedback/{user_id}", get(list_feedback_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a service error onto a status code and `{"error": ...}` body.
fn error_response(err: ChatError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        ChatError::NotFound { .. } => StatusCode::NOT_FOUND,
        ChatError::Validation(_) => StatusCode::BAD_REQUEST,
        ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
        ChatError::SessionEnded(_) => StatusCode::CONFLICT,
        ChatError::Conflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::Store(_) | ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

/// GET /health - liveness check.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "hamo-ume",
    }))
}

/// Run a synchronous service call on the blocking pool; store backends may
/// block on disk I/O.
async fn with_service<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ChatService) -> Result<T, ChatError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    blocking(move || f(&service))
        .await
        .map(Json)
        .map_err(error_response)
}

// ---------------------------------------------------------------------------
// Avatars
// ---------------------------------------------------------------------------

async fn create_avatar_handler(
    State(state): State<AppState>,
    Json(request): Json<NewAvatar>,
) -> ApiResult<Avatar> {
    with_service(&state, move |s| s.create_avatar(request)).await
}

async fn get_avatar_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Avatar> {
    with_service(&state, move |s| s.get_avatar(&id)).await
}

#[derive(Debug, Deserialize)]
struct UpdateAvatarRequest {
    pro_user_id: String,
    #[serde(flatten)]
    update: AvatarUpdate,
}

/// PUT /api/v1/avatars/{id} - edit an avatar. Only the owning pro may do so.
async fn update_avatar_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAvatarRequest>,
) -> ApiResult<Avatar> {
    with_service(&state, move |s| {
        s.update_avatar(&id, &request.pro_user_id, request.update)
    })
    .await
}

async fn list_avatars_handler(
    State(state): State<AppState>,
    Path(pro_id): Path<String>,
) -> ApiResult<Vec<Avatar>> {
    with_service(&state, move |s| s.list_avatars(&pro_id)).await
}

async fn list_minds_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AiMind>> {
    with_service(&state, move |s| s.list_minds(&id)).await
}

// ---------------------------------------------------------------------------
// Minds
// ---------------------------------------------------------------------------

/// POST /api/v1/minds - create a mind and seed its trajectory.
///
/// Response: `{ "mind": AiMind, "psvs": PsvsPosition }`
async fn create_mind_handler(
    State(state): State<AppState>,
    Json(request): Json<NewMind>,
) -> ApiResult<Value> {
    with_service(&state, move |s| {
        let (mind, position): (AiMind, PsvsPosition) = s.create_mind(request)?;
        Ok(json!({ "mind": mind, "psvs": position }))
    })
    .await
}

async fn get_mind_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AiMind> {
    with_service(&state, move |s| s.get_mind(&id)).await
}

#[derive(Debug, Deserialize)]
struct UpdateMindRequest {
    pro_user_id: String,
    #[serde(flatten)]
    update: MindUpdate,
}

/// PUT /api/v1/minds/{id} - edit a mind. Only the authoring pro may do so.
async fn update_mind_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMindRequest>,
) -> ApiResult<AiMind> {
    with_service(&state, move |s| {
        s.update_mind(&id, &request.pro_user_id, request.update)
    })
    .await
}

async fn get_psvs_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PsvsRecord> {
    with_service(&state, move |s| s.get_psvs(&id)).await
}

async fn list_sessions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConversationSession>> {
    with_service(&state, move |s| s.list_sessions(&id)).await
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    mind_id: String,
}

async fn start_session_handler(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<ConversationSession> {
    with_service(&state, move |s| s.start_session(&request.mind_id)).await
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConversationSession> {
    with_service(&state, move |s| s.get_session(&id)).await
}

async fn end_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConversationSession> {
    with_service(&state, move |s| s.end_session(&id)).await
}

async fn list_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConversationMessage>> {
    with_service(&state, move |s| s.list_messages(&id)).await
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: String,
}

/// POST /api/v1/sessions/{id}/messages - one chat turn.
///
/// Request:  `{ "message": "..." }`
/// Response: `ChatTurnResult`
///
/// A failed completion still returns 200 with `fallback_used: true`.
async fn send_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<ChatTurnResult> {
    state
        .service
        .send_message(&id, &request.message)
        .await
        .map(Json)
        .map_err(error_response)
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// POST /api/v1/feedback/session - post-session self-report.
async fn submit_feedback_handler(
    State(state): State<AppState>,
    Json(request): Json<NewFeedback>,
) -> ApiResult<SessionFeedback> {
    with_service(&state, move |s| s.submit_feedback(request)).await
}

async fn list_feedback_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<SessionFeedback>> {
    with_service(&state, move |s| s.list_feedback(&user_id)).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
