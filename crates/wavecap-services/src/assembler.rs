//! Assembler — concatenates a session's chunks into the completed artifact.
//!
//! At most one assembly task runs per session: the `assembly_state` CAS from
//! `Pending` to `InProgress` in `assemble()` is the only correctness-critical
//! synchronization (§4.4). Every exit path writes a terminal state so a
//! session is never left wedged in `InProgress`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use wavecap_core::error::CoreError;
use wavecap_core::session::{now_ms, AssemblyResult, AssemblyState};

use crate::chunk_store::ChunkStore;
use crate::session_registry::SessionRegistry;

#[derive(Debug, Serialize)]
struct CompletedMeta {
    session_id: String,
    total_chunks: u32,
    total_bytes: u64,
    format: String,
    created_at: u64,
    completed_at: u64,
    #[serde(flatten)]
    passthrough_metadata: HashMap<String, String>,
}

pub struct Assembler {
    store: ChunkStore,
    registry: SessionRegistry,
    buffer_bytes: usize,
    /// Sessions with an assembly task currently spawned — a cheap guard to
    /// avoid scheduling a second worker for the same session while one is
    /// outstanding, on top of the state-machine CAS that guarantees
    /// correctness even if this guard were absent.
    in_flight: Arc<DashSet<String>>,
}

impl Assembler {
    pub fn new(store: ChunkStore, registry: SessionRegistry, buffer_bytes: usize) -> Self {
        Self {
            store,
            registry,
            buffer_bytes,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Spawns a background assembly task for `session_id` unless one is
    /// already outstanding. Fire-and-forget: callers observe the result via
    /// the session's `assembly_state` through the status verb.
    pub fn spawn_assembly(self: &Arc<Self>, session_id: String) {
        if !self.in_flight.insert(session_id.clone()) {
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = this.assemble(&session_id).await {
                tracing::warn!(session_id, error = %err, "assembly did not complete");
            }
            this.in_flight.remove(&session_id);
        });
    }

    /// Runs assembly synchronously. Safe to call directly in tests or from
    /// the manual "assemble" administrative verb.
    pub async fn assemble(&self, session_id: &str) -> Result<(), CoreError> {
        // Step 1: CAS pending -> in_progress.
        let gated = self.registry.update(session_id, |rec| {
            if rec.assembly_state == AssemblyState::Pending {
                rec.assembly_state = AssemblyState::InProgress;
                true
            } else {
                false
            }
        });
        match gated {
            None => return Err(CoreError::UnknownSession),
            Some(false) => return Ok(()), // not our turn to assemble; no-op
            Some(true) => {}
        }

        match self.run_assembly(session_id).await {
            Ok(result) => {
                self.registry.update(session_id, |rec| {
                    rec.assembly_state = AssemblyState::Done;
                    rec.assembly_result = Some(AssemblyResult::Artifact(result));
                    rec.completed_at = Some(now_ms());
                });
                tracing::info!(session_id, "assembly completed");
                Ok(())
            }
            Err(CoreError::MissingChunks(missing)) => {
                self.registry.update(session_id, |rec| {
                    rec.assembly_state = AssemblyState::Pending;
                });
                tracing::warn!(session_id, missing, "assembly deferred: chunks still missing");
                Err(CoreError::MissingChunks(missing))
            }
            Err(err) => {
                self.registry.update(session_id, |rec| {
                    rec.assembly_state = AssemblyState::Failed;
                    rec.assembly_result = Some(AssemblyResult::Error(err.to_string()));
                });
                tracing::error!(session_id, error = %err, "assembly failed");
                Err(err)
            }
        }
    }

    async fn run_assembly(&self, session_id: &str) -> Result<std::path::PathBuf, CoreError> {
        let record = self.registry.get(session_id).ok_or(CoreError::UnknownSession)?;

        // Step 2: every index must be present.
        let on_disk = self.store.list_session(session_id).await?;
        let present: std::collections::HashSet<u32> = on_disk.iter().map(|(i, _)| *i).collect();
        let missing = (0..record.total_chunks)
            .filter(|i| !present.contains(i))
            .count();
        if missing > 0 {
            return Err(CoreError::MissingChunks(missing));
        }

        // Step 3: stream each chunk in index order into a temp file, then
        // atomically rename into place.
        let (temp_path, mut temp_file) = self.store.open_completed_temp(session_id).await?;
        let mut total_bytes = 0u64;
        for index in 0..record.total_chunks {
            let result = self
                .store
                .stream_chunk_into(session_id, index, &mut temp_file, self.buffer_bytes)
                .await;
            let n = match result {
                Ok(n) => n,
                Err(err) => {
                    self.store.remove_file_best_effort(&temp_path).await;
                    return Err(err);
                }
            };
            total_bytes += n;
        }
        temp_file.sync_all().await.map_err(|e| CoreError::io(&temp_path, e))?;
        drop(temp_file);

        let artifact_path = match self
            .store
            .publish_completed_file(session_id, &record.recording_name, &temp_path)
            .await
        {
            Ok(path) => path,
            Err(err) => {
                self.store.remove_file_best_effort(&temp_path).await;
                return Err(err);
            }
        };

        // Step 4: sidecar metadata file, same atomic-rename discipline.
        let meta = CompletedMeta {
            session_id: session_id.to_string(),
            total_chunks: record.total_chunks,
            total_bytes,
            format: record.format.clone(),
            created_at: record.created_at,
            completed_at: now_ms(),
            passthrough_metadata: record.passthrough_metadata.clone(),
        };
        self.write_sidecar(session_id, &record.recording_name, &meta).await?;

        // Step 5: delete the chunks subtree.
        self.store.delete_session_chunks(session_id).await?;

        Ok(artifact_path)
    }

    async fn write_sidecar(
        &self,
        session_id: &str,
        recording_name: &str,
        meta: &CompletedMeta,
    ) -> Result<(), CoreError> {
        let (temp_path, mut temp_file) = self.store.open_completed_temp(session_id).await?;
        let text = serde_json::to_vec_pretty(meta).expect("CompletedMeta is always serializable");
        temp_file
            .write_all(&text)
            .await
            .map_err(|e| CoreError::io(&temp_path, e))?;
        temp_file.sync_all().await.map_err(|e| CoreError::io(&temp_path, e))?;
        drop(temp_file);
        let sidecar_name = format!("{recording_name}.meta");
        if let Err(err) = self
            .store
            .publish_completed_file(session_id, &sidecar_name, &temp_path)
            .await
        {
            self.store.remove_file_best_effort(&temp_path).await;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wavecap_core::session::SessionRecord;

    fn setup() -> (TempDir, Assembler, SessionRegistry) {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(
            tmp.path().to_path_buf(),
            wavecap_core::identifier::DEFAULT_SESSION_ID_ALPHABET.to_string(),
        );
        let registry = SessionRegistry::new();
        let assembler = Assembler::new(store, registry.clone(), 64 * 1024);
        (tmp, assembler, registry)
    }

    fn pending_record(id: &str, total_chunks: u32) -> SessionRecord {
        let mut rec = SessionRecord::new(
            id.to_string(),
            total_chunks,
            None,
            "demo.webm".into(),
            "webm".into(),
            HashMap::new(),
        );
        rec.assembly_state = AssemblyState::Pending;
        rec
    }

    #[tokio::test]
    async fn assembles_complete_session() {
        let (_tmp, assembler, registry) = setup();
        registry.insert(pending_record("s1", 2));
        assembler.store.append_at("s1", 0, 0, b"hello ").await.unwrap();
        assembler.store.append_at("s1", 1, 0, b"world").await.unwrap();

        assembler.assemble("s1").await.unwrap();

        let rec = registry.get("s1").unwrap();
        assert_eq!(rec.assembly_state, AssemblyState::Done);
        let artifact = assembler.store.completed_artifact_path("s1", "demo.webm");
        let content = std::fs::read(&artifact).unwrap();
        assert_eq!(content, b"hello world");
        assert!(assembler.store.list_session("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn defers_when_chunks_missing() {
        let (_tmp, assembler, registry) = setup();
        registry.insert(pending_record("s1", 2));
        assembler.store.append_at("s1", 0, 0, b"hello").await.unwrap();

        let err = assembler.assemble("s1").await.unwrap_err();
        assert!(matches!(err, CoreError::MissingChunks(1)));

        let rec = registry.get("s1").unwrap();
        assert_eq!(rec.assembly_state, AssemblyState::Pending);
    }

    #[tokio::test]
    async fn refuses_to_assemble_when_not_pending() {
        let (_tmp, assembler, registry) = setup();
        let mut rec = pending_record("s1", 1);
        rec.assembly_state = AssemblyState::None;
        registry.insert(rec);

        assembler.assemble("s1").await.unwrap();
        let rec = registry.get("s1").unwrap();
        assert_eq!(rec.assembly_state, AssemblyState::None);
    }
}
