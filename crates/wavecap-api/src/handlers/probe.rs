//! (c) Probe — the basis of crash-resume. The client probes before
//! re-appending so it always knows the accepted offset to resume from.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub accepted_offset: u64,
}

pub async fn handle_probe(
    State(state): State<ApiState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
) -> Result<Json<ProbeResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    let record = state
        .registry
        .get(&session_id)
        .ok_or(CoreError::UnknownSession)
        .map_err(error_response)?;
    if record.metadata_known && chunk_index >= record.total_chunks {
        return Err(error_response(CoreError::UnknownChunk(chunk_index)));
    }

    let accepted_offset = state
        .store
        .size_of(&session_id, chunk_index)
        .await
        .map_err(error_response)?
        .unwrap_or(0);

    Ok(Json(ProbeResponse { accepted_offset }))
}
