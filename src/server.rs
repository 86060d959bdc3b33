use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::get,
    Extension,
};
use tower_http::{
    trace::TraceLayer,
    limit::RequestBodyLimitLayer,
    cors::CorsLayer,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::handlers::{health_check, probe_chunk, upload_chunk};
use crate::middleware::validate_api_key;
use crate::state::AppState;
use crate::utils::shutdown_signal;
use crate::config::Config;

/// build the upload router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!(
        "Building router with max chunk body size: {} bytes",
        config.max_chunk_body_size
    );

    // configure cors; browser uploader widgets post chunks cross-origin
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_origin(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_origin(origins)
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/upload", get(probe_chunk).post(upload_chunk))
        .route("/health", get(health_check))
        .layer(axum::middleware::from_fn(validate_api_key))
        .layer(Extension(config.api_key_hash.clone()))
        // axum caps extractor bodies at 2MB unless raised; the tower-http
        // layer then enforces the configured ceiling
        .layer(DefaultBodyLimit::max(config.max_chunk_body_size))
        .layer(RequestBodyLimitLayer::new(config.max_chunk_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the upload server
pub async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    tracing::debug!("Listener bound to {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Server running and ready to accept connections");
    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Chunkbay starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 UPLOAD SERVER: http://{}:{}", config.host, config.port);
    tracing::info!("📁 Assembling uploads into: {:?}", config.uploads_dir.canonicalize().unwrap_or(config.uploads_dir.clone()));
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
