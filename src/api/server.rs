use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    decompression::RequestDecompressionLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::{services, state::AppState, ws};
use crate::config::Config;
use crate::generation::HttpGenerationClient;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with their middleware
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.server.max_body_bytes.as_u64()).unwrap_or(usize::MAX);
    let cors = cors_layer(state.config.server.cors_origin.as_deref());

    Router::new()
        .route("/health", get(services::health))
        .route("/api/text/segment", post(services::segment_text))
        .route("/api/text/preview-segment", post(services::preview_segment))
        .route("/api/text/validate", post(services::validate_text))
        .route("/api/text/optimize", post(services::optimize_text))
        .route("/api/image/generate", post(services::generate_image))
        .route("/api/image/generate-batch", post(services::generate_batch))
        .route("/api/image/templates", get(services::list_templates))
        .route("/api/jobs/{job_id}/cancel", post(services::cancel_job))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // Transparent gzip request bodies
        .layer(RequestDecompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!("Invalid cors_origin, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr;

    let generator = HttpGenerationClient::new(config.generation.clone())
        .map_err(|e| format!("Failed to build generation client: {}", e))?;
    let state = AppState::new(config, Arc::new(generator));

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "notegen API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
