pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use state::ApiState;

/// Builds the router without binding a socket — used directly by
/// integration tests via `tower::ServiceExt::oneshot`.
pub fn router(state: ApiState, max_chunk_bytes: u64) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::handle_health))
        .route(
            "/sessions/{session_id}",
            get(handlers::handle_status).delete(handlers::handle_cancel),
        )
        .route("/sessions/{session_id}/complete", post(handlers::handle_completion_signal))
        .route("/sessions/{session_id}/assemble", post(handlers::handle_assemble))
        .route(
            "/sessions/{session_id}/chunks/{chunk_index}",
            post(handlers::handle_create_chunk_slot)
                .get(handlers::handle_probe)
                .layer(DefaultBodyLimit::max(max_chunk_bytes as usize)),
        )
        .route(
            "/sessions/{session_id}/chunks/{chunk_index}/append",
            post(handlers::handle_append).layer(DefaultBodyLimit::max(max_chunk_bytes as usize)),
        )
        .route(
            "/sessions/{session_id}/chunks/{chunk_index}/upload",
            post(handlers::handle_multipart_append).layer(DefaultBodyLimit::max(max_chunk_bytes as usize)),
        )
        .route(
            "/sessions/{session_id}/chunks/{chunk_index}/verify",
            get(handlers::handle_verify),
        )
        .with_state(state)
        .layer(cors)
}

/// Serves the API until `shutdown` fires, then drains in-flight requests
/// and returns.
pub async fn serve(
    state: ApiState,
    bind_addr: String,
    port: u16,
    max_chunk_bytes: u64,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state, max_chunk_bytes);

    let listener = tokio::net::TcpListener::bind(format!("{bind_addr}:{port}")).await?;
    tracing::info!(%bind_addr, port, "API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("API shutting down");
        })
        .await?;
    Ok(())
}
