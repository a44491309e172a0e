//! wheretogo - conversational event search
//!
//! Hosts chat sessions that stream answers and event recommendations from a
//! remote AI flow.

mod api;
mod config;
mod flow;
mod runtime;
mod session;

use api::{create_router, AppState};
use config::AppConfig;
use flow::{FlowClient, GenkitFlowClient, LoggingFlowClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wheretogo=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Flow transport
    let genkit = GenkitFlowClient::new(config.flow_url.clone())?;
    let flow: Arc<dyn FlowClient> = Arc::new(LoggingFlowClient::new(Arc::new(genkit)));
    tracing::info!(
        endpoint = %flow.endpoint(),
        request_timeout_secs = config.request_timeout.as_secs(),
        "Flow client initialized"
    );

    let state = AppState::new(flow, config.runtime());
    tracing::info!(
        idle_timeout_secs = config.idle_timeout.as_secs(),
        max_sessions = config.max_sessions,
        "Session manager initialized"
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("wheretogo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
