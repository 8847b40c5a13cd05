//! Error taxonomy shared by the chunk store, session registry, and protocol
//! handlers. Kept free of any HTTP concern — the API crate maps these to wire
//! errors at the edge.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("session identifier is invalid: {0}")]
    BadIdentifier(String),

    #[error("metadata conflicts with existing session record: {0}")]
    MetadataConflict(String),

    #[error("no such session")]
    UnknownSession,

    #[error("no such chunk index {0}")]
    UnknownChunk(u32),

    #[error("offset mismatch: actual accepted offset is {actual_offset}")]
    OffsetMismatch { actual_offset: u64 },

    #[error("request body exceeds the configured chunk size limit")]
    PayloadTooLarge,

    #[error("storage is full")]
    StorageFull,

    #[error("assembly is already in progress for this session")]
    AssemblyInProgress,

    #[error("cannot assemble: {0} chunk(s) are still missing")]
    MissingChunks(usize),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_mismatch_carries_actual_offset() {
        let err = CoreError::OffsetMismatch { actual_offset: 4096 };
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn missing_chunks_carries_count() {
        let err = CoreError::MissingChunks(3);
        assert!(err.to_string().contains('3'));
    }
}
