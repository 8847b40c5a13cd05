//! (h) Verify chunk — lets the client confirm a chunk actually persisted
//! before it deletes its own local copy.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub exists: bool,
    pub size: u64,
    pub path_hint: Option<String>,
}

pub async fn handle_verify(
    State(state): State<ApiState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
) -> Result<Json<VerifyResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    state
        .registry
        .get(&session_id)
        .ok_or(CoreError::UnknownSession)
        .map_err(error_response)?;

    let size = state
        .store
        .size_of(&session_id, chunk_index)
        .await
        .map_err(error_response)?;

    Ok(Json(VerifyResponse {
        exists: size.is_some(),
        size: size.unwrap_or(0),
        path_hint: size.map(|_| format!("{session_id}/chunks/{chunk_index}")),
    }))
}
