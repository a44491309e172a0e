//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, SessionInfo, SessionResponse, SubmitRequest,
    SubmitResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::SessionError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/close", post(close_session))
        // Snapshot streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/submit", post(submit_query))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let handle = state.sessions.create().await?;
    Ok(Json(CreateSessionResponse {
        session: SessionInfo::from(&handle),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(SessionResponse {
        session: SessionInfo::from(&handle),
        state: handle.snapshot(),
    }))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(sse_stream(handle.subscribe(), handle.closed()))
}

// ============================================================
// User Actions
// ============================================================

/// Queue a query. Accepted even when the session ignores it, such as while
/// another request is in flight.
async fn submit_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    state.sessions.submit(&id, req.query).await?;
    Ok(Json(SubmitResponse { queued: true }))
}

async fn get_version() -> &'static str {
    concat!("wheretogo ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            // A closed session is as gone as an unknown one
            SessionError::NotFound(_) | SessionError::Closed(_) => AppError::NotFound(e.to_string()),
            SessionError::LimitReached(_) => AppError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
