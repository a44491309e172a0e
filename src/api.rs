//! HTTP API for chat sessions

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::flow::FlowClient;
use crate::runtime::{RuntimeConfig, SessionManager};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(flow: Arc<dyn FlowClient>, config: RuntimeConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(flow, config));
        sessions.spawn_sweeper();
        Self { sessions }
    }
}
