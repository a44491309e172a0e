//! API request and response types

use crate::runtime::SessionHandle;
use crate::session::SessionSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to submit a query
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
}

/// Session identity
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&SessionHandle> for SessionInfo {
    fn from(handle: &SessionHandle) -> Self {
        Self {
            id: handle.id.clone(),
            created_at: handle.created_at,
        }
    }
}

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session: SessionInfo,
}

/// Response with a session and its current snapshot
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
    pub state: SessionSnapshot,
}

/// Response for submit action
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
