//! Fallback multipart append — a one-shot alternative to the resumable
//! octet-stream append for clients that can't track an offset. Always
//! writes at offset 0, overwriting any partial prior attempt.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;

use crate::handlers::{error_response, ErrorBody};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct FallbackAppendResponse {
    pub outcome: &'static str,
    pub chunk_index: u32,
}

pub async fn handle_multipart_append(
    State(state): State<ApiState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
    mut multipart: Multipart,
) -> Result<Json<FallbackAppendResponse>, (StatusCode, Json<ErrorBody>)> {
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
    if record.chunks_persisted.contains(&chunk_index) {
        return Ok(Json(FallbackAppendResponse {
            outcome: "chunk_already_exists",
            chunk_index,
        }));
    }

    let mut field_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| error_response(CoreError::BadIdentifier("malformed multipart body".into())))?
    {
        let bytes = field
            .bytes()
            .await
            .map_err(|_| error_response(CoreError::BadIdentifier("malformed multipart field".into())))?;
        field_bytes = Some(bytes);
        break;
    }
    let bytes = field_bytes
        .ok_or_else(|| error_response(CoreError::BadIdentifier("multipart body has no data field".into())))?;

    if bytes.len() as u64 > state.config.storage.max_chunk_bytes {
        return Err(error_response(CoreError::PayloadTooLarge));
    }

    let size = state
        .store
        .write_full(&session_id, chunk_index, &bytes)
        .await
        .map_err(error_response)?;

    state
        .registry
        .update(&session_id, |rec| rec.mark_chunk_persisted(chunk_index, size))
        .ok_or(CoreError::UnknownSession)
        .map_err(error_response)?;

    Ok(Json(FallbackAppendResponse {
        outcome: "chunk_received",
        chunk_index,
    }))
}
