//! (b) Append bytes.
//!
//! Wire contract: the client sends its current belief of the chunk's
//! accepted offset in the `Upload-Offset` header, and the raw body bytes
//! with content-type `application/offset+octet-stream`. It sets
//! `Upload-Chunk-Complete: true` on the append that finishes a chunk.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;

use crate::handlers::{error_response, offset_mismatch_response};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub accepted_offset: u64,
}

fn declared_offset(headers: &HeaderMap) -> Result<u64, CoreError> {
    headers
        .get("upload-offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| CoreError::BadIdentifier("missing or invalid Upload-Offset header".into()))
}

fn chunk_is_final(headers: &HeaderMap) -> bool {
    headers
        .get("upload-chunk-complete")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub async fn handle_append(
    State(state): State<ApiState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match append_inner(&state, &session_id, chunk_index, &headers, body).await {
        Ok(resp) => Json(resp).into_response(),
        Err(CoreError::OffsetMismatch { actual_offset }) => {
            offset_mismatch_response(actual_offset).into_response()
        }
        Err(err) => error_response(err).into_response(),
    }
}

async fn append_inner(
    state: &ApiState,
    session_id: &str,
    chunk_index: u32,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<AppendResponse, CoreError> {
    validate_session_id(session_id, &state.config.storage.session_identifier_alphabet)?;

    let record = state.registry.get(session_id).ok_or(CoreError::UnknownSession)?;
    if record.metadata_known && chunk_index >= record.total_chunks {
        return Err(CoreError::UnknownChunk(chunk_index));
    }

    if body.len() as u64 > state.config.storage.max_chunk_bytes {
        return Err(CoreError::PayloadTooLarge);
    }

    let declared = declared_offset(headers)?;
    let actual = state.store.size_of(session_id, chunk_index).await?.unwrap_or(0);
    if actual != declared {
        return Err(CoreError::OffsetMismatch { actual_offset: actual });
    }

    let new_offset = state
        .store
        .append_at(session_id, chunk_index, declared, &body)
        .await?;

    let is_final = chunk_is_final(headers);
    state
        .registry
        .update(session_id, |rec| {
            rec.chunk_offsets.insert(chunk_index, new_offset);
            if is_final {
                rec.mark_chunk_persisted(chunk_index, new_offset);
            }
            rec.touch();
        })
        .ok_or(CoreError::UnknownSession)?;

    Ok(AppendResponse {
        accepted_offset: new_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_declared_offset_header() {
        let mut headers = HeaderMap::new();
        headers.insert("upload-offset", "4096".parse().unwrap());
        assert_eq!(declared_offset(&headers).unwrap(), 4096);
    }

    #[test]
    fn missing_offset_header_is_bad_identifier() {
        let headers = HeaderMap::new();
        assert!(matches!(declared_offset(&headers), Err(CoreError::BadIdentifier(_))));
    }

    #[test]
    fn chunk_is_final_reads_header() {
        let mut headers = HeaderMap::new();
        headers.insert("upload-chunk-complete", "true".parse().unwrap());
        assert!(chunk_is_final(&headers));
        assert!(!chunk_is_final(&HeaderMap::new()));
    }
}
