//! (g) Cancel — removes a session and its chunk subtree. Refuses while
//! assembly is in progress so a concurrent assembler never reads a
//! half-deleted chunk tree. The refusal check and the registry removal
//! happen inside one `remove_if` call, which holds the same per-key lock
//! `update` uses, so the assembler's pending-to-in-progress CAS can never
//! land between the check and the delete.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;
use wavecap_core::session::AssemblyState;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub async fn handle_cancel(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<CancelResponse>, (StatusCode, Json<ErrorBody>)> {
    validate_session_id(&session_id, &state.config.storage.session_identifier_alphabet)
        .map_err(error_response)?;

    let removed = state
        .registry
        .remove_if(&session_id, |rec| rec.assembly_state != AssemblyState::InProgress);

    let Some(_record) = removed else {
        // Either the session never existed, or it did and is mid-assembly;
        // re-check presence only to pick the right error to report.
        return match state.registry.get(&session_id) {
            Some(_) => Err(error_response(CoreError::AssemblyInProgress)),
            None => Err(error_response(CoreError::UnknownSession)),
        };
    };

    state
        .store
        .delete_session(&session_id)
        .await
        .map_err(error_response)?;

    Ok(Json(CancelResponse { cancelled: true }))
}
