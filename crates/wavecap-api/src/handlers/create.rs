//! (a) Create chunk slot.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use wavecap_core::error::CoreError;
use wavecap_core::identifier::{sanitize_recording_name, validate_session_id};
use wavecap_core::session::SessionRecord;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct CreateChunkSlotRequest {
    pub total_chunks: u32,
    #[serde(default)]
    pub expected_total_bytes: Option<u64>,
    pub recording_name: String,
    pub format: String,
    #[serde(flatten)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CreateChunkSlotResponse {
    pub resource: String,
    pub accepted_offset: u64,
}

pub async fn handle_create_chunk_slot(
    State(state): State<ApiState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
    Json(req): Json<CreateChunkSlotRequest>,
) -> Result<Json<CreateChunkSlotResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    if req.total_chunks == 0 {
        return Err(error_response(CoreError::MetadataConflict(
            "total_chunks must be greater than zero".into(),
        )));
    }

    let recording_name = sanitize_recording_name(&req.recording_name);

    let conflict = state.registry.update(&session_id, |rec| {
        if !rec.metadata_known {
            rec.total_chunks = req.total_chunks;
            rec.expected_total_bytes = req.expected_total_bytes;
            rec.recording_name = recording_name.clone();
            rec.format = req.format.clone();
            rec.passthrough_metadata = req.metadata.clone();
            rec.metadata_known = true;
            None
        } else if rec.total_chunks != req.total_chunks
            || rec.recording_name != recording_name
            || rec.format != req.format
        {
            Some(CoreError::MetadataConflict(format!(
                "session {session_id} already has different create-chunk-slot metadata"
            )))
        } else {
            None
        }
    });

    if let Some(Some(err)) = conflict {
        return Err(error_response(err));
    }
    if conflict.is_none() {
        state.registry.insert(SessionRecord::new(
            session_id.clone(),
            req.total_chunks,
            req.expected_total_bytes,
            recording_name,
            req.format.clone(),
            req.metadata.clone(),
        ));
    }

    state.registry.update(&session_id, |rec| rec.touch());

    state
        .store
        .ensure_chunk_slot(&session_id, chunk_index)
        .await
        .map_err(error_response)?;

    Ok(Json(CreateChunkSlotResponse {
        resource: format!("/sessions/{session_id}/chunks/{chunk_index}"),
        accepted_offset: 0,
    }))
}
