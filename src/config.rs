//! Process configuration read from the environment

use crate::flow::DEFAULT_FLOW_URL;
use crate::runtime::{
    RuntimeConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS, DEFAULT_REQUEST_TIMEOUT,
};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub flow_url: String,
    pub request_timeout: Duration,
    /// Unobserved sessions untouched this long are evicted
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("WHERETOGO_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let flow_url = lookup("WHERETOGO_FLOW_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FLOW_URL.to_string());

        let request_timeout = lookup("WHERETOGO_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        let idle_timeout = lookup("WHERETOGO_SESSION_IDLE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map_or(DEFAULT_IDLE_TIMEOUT, Duration::from_secs);

        let max_sessions = lookup("WHERETOGO_MAX_SESSIONS")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&max| max > 0)
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        Self {
            port,
            flow_url,
            request_timeout,
            idle_timeout,
            max_sessions,
        }
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            request_timeout: self.request_timeout,
            idle_timeout: self.idle_timeout,
            max_sessions: self.max_sessions,
        }
    }
}
