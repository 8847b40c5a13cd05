//! (e) Completion signal and (f) manual assemble trigger. Both funnel
//! through the Completion Coordinator, making assemble idempotent with the
//! signal it stands in for.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use wavecap_core::identifier::validate_session_id;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct CompletionSignalRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionSignalResponse {
    pub assembly_state: String,
}

pub async fn handle_completion_signal(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<CompletionSignalRequest>,
) -> Result<Json<CompletionSignalResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    if !req.metadata.is_empty() || req.file_name.is_some() {
        state.registry.update(&session_id, |rec| {
            rec.passthrough_metadata.extend(req.metadata.clone());
            if let Some(name) = &req.file_name {
                if rec.recording_name.is_empty() {
                    rec.recording_name = name.clone();
                }
            }
        });
    }

    signal(&state, &session_id).await
}

pub async fn handle_assemble(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<CompletionSignalResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;
    signal(&state, &session_id).await
}

async fn signal(
    state: &ApiState,
    session_id: &str,
) -> Result<Json<CompletionSignalResponse>, (StatusCode, Json<ErrorBody>)> {
    let assembly_state = state
        .completion
        .signal(session_id)
        .map_err(error_response)?;

    Ok(Json(CompletionSignalResponse {
        assembly_state: assembly_state.to_string(),
    }))
}

