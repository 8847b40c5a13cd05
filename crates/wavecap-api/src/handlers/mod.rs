//! HTTP protocol handlers — translate wire requests into Chunk Store and
//! Session Registry operations.

pub mod append;
pub mod cancel;
pub mod complete;
pub mod create;
pub mod fallback;
pub mod health;
pub mod probe;
pub mod status;
pub mod verify;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use wavecap_core::error::CoreError;

pub use append::handle_append;
pub use cancel::handle_cancel;
pub use complete::{handle_assemble, handle_completion_signal};
pub use create::handle_create_chunk_slot;
pub use fallback::handle_multipart_append;
pub use health::handle_health;
pub use probe::handle_probe;
pub use status::handle_status;
pub use verify::handle_verify;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Maps a `CoreError` to the wire error shape defined in SPEC_FULL §6/§7.
pub fn error_response(err: CoreError) -> (StatusCode, Json<ErrorBody>) {
    let (status, kind) = match &err {
        CoreError::BadIdentifier(_) => (StatusCode::BAD_REQUEST, "bad_identifier"),
        CoreError::MetadataConflict(_) => (StatusCode::CONFLICT, "metadata_conflict"),
        CoreError::UnknownSession => (StatusCode::NOT_FOUND, "unknown_session"),
        CoreError::UnknownChunk(_) => (StatusCode::NOT_FOUND, "unknown_chunk"),
        CoreError::OffsetMismatch { .. } => (StatusCode::CONFLICT, "offset_mismatch"),
        CoreError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
        CoreError::StorageFull => (StatusCode::INSUFFICIENT_STORAGE, "storage_full"),
        CoreError::AssemblyInProgress => (StatusCode::CONFLICT, "assembly_in_progress"),
        CoreError::MissingChunks(_) => (StatusCode::CONFLICT, "missing_chunks"),
        CoreError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    };
    let message = err.to_string();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed with a storage error");
    }
    (
        status,
        Json(ErrorBody {
            error: kind.to_string(),
            message,
        }),
    )
}

/// The offset-mismatch variant additionally carries the actual offset in the
/// response body so the client can correct and retry without another probe.
#[derive(Debug, Serialize)]
pub struct OffsetMismatchBody {
    pub error: &'static str,
    pub message: String,
    pub actual_offset: u64,
}

pub fn offset_mismatch_response(actual_offset: u64) -> (StatusCode, Json<OffsetMismatchBody>) {
    (
        StatusCode::CONFLICT,
        Json(OffsetMismatchBody {
            error: "offset_mismatch",
            message: format!("actual accepted offset is {actual_offset}"),
            actual_offset,
        }),
    )
}
