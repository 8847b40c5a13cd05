//! (d) Session status — drives the client's decision to send the completion
//! signal, and its polling loop once assembly is underway.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;
use wavecap_core::session::AssemblyResult;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub total_chunks: u32,
    pub persisted_count: u32,
    pub missing_indices: Vec<u32>,
    pub assembly_state: String,
    pub artifact_path: Option<String>,
}

pub async fn handle_status(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    let record = state
        .registry
        .get(&session_id)
        .ok_or(CoreError::UnknownSession)
        .map_err(error_response)?;

    let artifact_path = match &record.assembly_result {
        Some(AssemblyResult::Artifact(path)) => Some(path.to_string_lossy().into_owned()),
        _ => None,
    };

    Ok(Json(StatusResponse {
        total_chunks: record.total_chunks,
        persisted_count: record.chunks_persisted.len() as u32,
        missing_indices: record.missing_indices(),
        assembly_state: record.assembly_state.to_string(),
        artifact_path,
    }))
}
