//! The session record: the unit of state the Session Registry holds and the
//! Protocol Handlers, Assembler, Completion Coordinator, and Sweeper all
//! mutate through it.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. Used for all session timestamps so the
/// record stays plain data, serializable, and comparable without pulling in a
/// calendar crate the rest of the workspace doesn't use.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyState {
    None,
    Pending,
    InProgress,
    Done,
    Failed,
}

impl std::fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssemblyState::None => "none",
            AssemblyState::Pending => "pending",
            AssemblyState::InProgress => "in_progress",
            AssemblyState::Done => "done",
            AssemblyState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssemblyResult {
    Artifact(PathBuf),
    Error(String),
}

/// One active or recently-completed upload. Owned exclusively by the Session
/// Registry; handlers and background tasks only ever see it through
/// `SessionRegistry::get`/`update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub total_chunks: u32,
    pub expected_total_bytes: Option<u64>,
    pub chunks_persisted: BTreeSet<u32>,
    pub chunk_sizes: HashMap<u32, u64>,
    pub chunk_offsets: HashMap<u32, u64>,
    pub recording_name: String,
    pub format: String,
    /// Passthrough metadata from create-chunk-slot, stored verbatim and
    /// written into the `.meta` sidecar at assembly time.
    pub passthrough_metadata: HashMap<String, String>,
    pub created_at: u64,
    pub last_activity_at: u64,
    pub completion_signalled: bool,
    pub assembly_state: AssemblyState,
    pub assembly_result: Option<AssemblyResult>,
    pub completed_at: Option<u64>,
    /// True once the fields above `total_chunks` have been re-supplied by the
    /// client. Only set false for records rehydrated from disk after a
    /// restart, before the client has reasserted metadata (§4.2).
    pub metadata_known: bool,
}

impl SessionRecord {
    pub fn new(
        session_id: String,
        total_chunks: u32,
        expected_total_bytes: Option<u64>,
        recording_name: String,
        format: String,
        passthrough_metadata: HashMap<String, String>,
    ) -> Self {
        let now = now_ms();
        Self {
            session_id,
            total_chunks,
            expected_total_bytes,
            chunks_persisted: BTreeSet::new(),
            chunk_sizes: HashMap::new(),
            chunk_offsets: HashMap::new(),
            recording_name,
            format,
            passthrough_metadata,
            created_at: now,
            last_activity_at: now,
            completion_signalled: false,
            assembly_state: AssemblyState::None,
            assembly_result: None,
            completed_at: None,
            metadata_known: true,
        }
    }

    /// A half-known record rehydrated from on-disk chunk trees at startup,
    /// before the client has reasserted `total_chunks`/`recording_name`/`format`.
    pub fn rehydrated(session_id: String) -> Self {
        let now = now_ms();
        Self {
            session_id,
            total_chunks: 0,
            expected_total_bytes: None,
            chunks_persisted: BTreeSet::new(),
            chunk_sizes: HashMap::new(),
            chunk_offsets: HashMap::new(),
            recording_name: String::new(),
            format: String::new(),
            passthrough_metadata: HashMap::new(),
            created_at: now,
            last_activity_at: now,
            completion_signalled: false,
            assembly_state: AssemblyState::None,
            assembly_result: None,
            completed_at: None,
            metadata_known: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = now_ms();
    }

    pub fn is_complete(&self) -> bool {
        self.metadata_known
            && self.total_chunks > 0
            && self.chunks_persisted.len() as u32 == self.total_chunks
    }

    pub fn missing_indices(&self) -> Vec<u32> {
        if !self.metadata_known {
            return Vec::new();
        }
        (0..self.total_chunks)
            .filter(|i| !self.chunks_persisted.contains(i))
            .collect()
    }

    pub fn mark_chunk_persisted(&mut self, index: u32, size: u64) {
        self.chunk_sizes.insert(index, size);
        self.chunk_offsets.insert(index, size);
        self.chunks_persisted.insert(index);
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionRecord {
        SessionRecord::new(
            "abc123".into(),
            3,
            Some(2500),
            "demo.webm".into(),
            "webm".into(),
            HashMap::new(),
        )
    }

    #[test]
    fn new_record_has_no_persisted_chunks() {
        let rec = sample();
        assert!(rec.chunks_persisted.is_empty());
        assert_eq!(rec.missing_indices(), vec![0, 1, 2]);
        assert!(!rec.is_complete());
    }

    #[test]
    fn marking_all_chunks_completes_the_record() {
        let mut rec = sample();
        rec.mark_chunk_persisted(0, 1000);
        rec.mark_chunk_persisted(1, 1000);
        rec.mark_chunk_persisted(2, 500);
        assert!(rec.is_complete());
        assert!(rec.missing_indices().is_empty());
    }

    #[test]
    fn rehydrated_record_is_half_known() {
        let rec = SessionRecord::rehydrated("xyz".into());
        assert!(!rec.metadata_known);
        assert!(rec.missing_indices().is_empty());
        assert!(!rec.is_complete());
    }
}
