//! Liveness token. No authentication, no dependency on storage — a probe
//! against this route only tells you the process is scheduling requests.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
