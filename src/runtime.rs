//! Runtime for executing sessions
//!
//! Each session runs as its own task that owns the session state and is the
//! only writer to it. Observers read published snapshots.

mod executor;


pub use executor::SessionRuntime;

use crate::flow::FlowClient;
use crate::session::{Event, SessionSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default time an unobserved session may sit untouched before eviction
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default cap on live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// How often the manager looks for idle sessions
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Settings shared by every session runtime
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// A request still streaming after this long is treated as failed
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {0} has been closed")]
    Closed(String),
    #[error("Session limit of {0} reached")]
    LimitReached(usize),
}

/// Handle to interact with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    pub created_at: DateTime<Utc>,
    event_tx: mpsc::Sender<Event>,
    /// Shared with the runtime; only subscribers hold receivers
    state_tx: Arc<watch::Sender<SessionSnapshot>>,
    shutdown: CancellationToken,
    last_active: Arc<Mutex<Instant>>,
}

impl SessionHandle {
    /// Queue a query. Whether it is accepted is decided by the session;
    /// rejected submissions leave no trace.
    pub async fn submit(&self, query: impl Into<String>) -> Result<(), SessionError> {
        self.touch();
        self.event_tx
            .send(Event::submit(query))
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot. A session with a
    /// live receiver is never evicted.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Resolves once the session is closed
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.shutdown.clone().cancelled_owned()
    }

    /// Stop the session and abort its in-flight stream
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Record activity, postponing eviction
    pub fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Untouched for `ttl`, unobserved and not streaming
    fn is_abandoned(&self, ttl: Duration) -> bool {
        self.idle_for() >= ttl
            && self.state_tx.receiver_count() == 0
            && !self.state_tx.borrow().in_flight
    }
}

/// Start a session runtime task and return its handle
pub fn spawn_session<F>(id: impl Into<String>, flow: F, config: RuntimeConfig) -> SessionHandle
where
    F: FlowClient + 'static,
{
    let id = id.into();
    let (event_tx, event_rx) = mpsc::channel(32);
    let state_tx = Arc::new(watch::Sender::new(SessionSnapshot::default()));
    let shutdown = CancellationToken::new();

    let runtime = SessionRuntime::new(
        id.clone(),
        flow,
        config,
        event_rx,
        event_tx.downgrade(),
        Arc::clone(&state_tx),
        shutdown.clone(),
    );

    let session_id = id.clone();
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(session_id = %session_id, "Session runtime finished");
    });

    SessionHandle {
        id,
        created_at: Utc::now(),
        event_tx,
        state_tx,
        shutdown,
        last_active: Arc::new(Mutex::new(Instant::now())),
    }
}

/// Manager for all live sessions
pub struct SessionManager {
    flow: Arc<dyn FlowClient>,
    config: RuntimeConfig,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(flow: Arc<dyn FlowClient>, config: RuntimeConfig) -> Self {
        Self {
            flow,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new, empty session. At the session cap, abandoned sessions
    /// are evicted first.
    pub async fn create(&self) -> Result<SessionHandle, SessionError> {
        let max = self.config.max_sessions;
        if self.session_count().await >= max {
            self.evict_idle().await;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= max {
            tracing::warn!(max_sessions = max, "Session limit reached");
            return Err(SessionError::LimitReached(max));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let handle = spawn_session(id.clone(), Arc::clone(&self.flow), self.config);
        sessions.insert(id.clone(), handle.clone());
        tracing::info!(session_id = %id, live = sessions.len(), "Session created");
        Ok(handle)
    }

    /// Look up a session. Counts as activity.
    pub async fn get(&self, id: &str) -> Result<SessionHandle, SessionError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        handle.touch();
        Ok(handle)
    }

    /// Submit a query to a session
    pub async fn submit(&self, id: &str, query: impl Into<String>) -> Result<(), SessionError> {
        self.get(id).await?.submit(query).await
    }

    /// Discard a session and its state
    pub async fn close(&self, id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        handle.close();

        let remaining = self.session_count().await;
        tracing::info!(session_id = %id, remaining, "Session closed");
        Ok(())
    }

    /// Close and drop every abandoned session. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.config.idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, handle| {
            if handle.is_abandoned(ttl) {
                handle.close();
                tracing::info!(session_id = %id, "Idle session evicted");
                false
            } else {
                true
            }
        });

        before - sessions.len()
    }

    /// Periodically evict abandoned sessions until the manager is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        let period = SWEEP_INTERVAL
            .min(self.config.idle_timeout)
            .max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let evicted = manager.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle sweep finished");
                }
            }
        });
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
