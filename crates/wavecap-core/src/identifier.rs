//! Path-safety validation for client-chosen identifiers.
//!
//! Session identifiers are never trusted to be filesystem-safe on their own;
//! every byte is checked against a conservative alphabet before the
//! identifier is allowed anywhere near a path.

use crate::error::CoreError;

pub const DEFAULT_SESSION_ID_ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-_";

/// Validates a session identifier against `alphabet`. Empty identifiers and
/// identifiers containing any byte outside the alphabet are rejected.
pub fn validate_session_id(session_id: &str, alphabet: &str) -> Result<(), CoreError> {
    if session_id.is_empty() {
        return Err(CoreError::BadIdentifier("session id is empty".into()));
    }
    if session_id.len() > 256 {
        return Err(CoreError::BadIdentifier("session id is too long".into()));
    }
    if !session_id.chars().all(|c| alphabet.contains(c)) {
        return Err(CoreError::BadIdentifier(format!(
            "session id {session_id:?} contains characters outside the allowed alphabet"
        )));
    }
    Ok(())
}

/// Sanitizes a client-supplied recording name into a safe file name: strips
/// any path components, strips leading dots, and replaces any character that
/// is not alphanumeric, `.`, `-`, or `_` with `_`. Falls back to a generic
/// name if the result would be empty.
pub fn sanitize_recording_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let trimmed = base.trim_start_matches('.');
    let sanitized: String = trimmed
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "recording".to_string()
    } else {
        sanitized
    }
}
