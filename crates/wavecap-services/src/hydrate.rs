//! Startup rehydration — reconstructs `chunks_persisted` and `chunk_sizes`
//! for every session directory found under the storage root by directory
//! enumeration (§4.2, §8 property 7).
//!
//! `total_chunks`, `recording_name`, and `format` cannot be recovered this
//! way; the resulting records are "half-known" (`metadata_known = false`)
//! until the client reasserts them on the next create-chunk-slot call.
//! Because the Session Registry itself is never persisted, no session can
//! be found `in_progress` at startup — the demotion rule described for a
//! persisted registry in §4.6 is satisfied by construction here.

use std::collections::HashMap;

use wavecap_core::session::SessionRecord;

use crate::chunk_store::ChunkStore;

pub async fn hydrate_from_disk(store: &ChunkStore) -> HashMap<String, SessionRecord> {
    let mut out = HashMap::new();
    let root = store.root();

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return out,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "hydrate: failed to scan storage root");
            return out;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(session_id) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if wavecap_core::identifier::validate_session_id(
            session_id,
            wavecap_core::identifier::DEFAULT_SESSION_ID_ALPHABET,
        )
        .is_err()
        {
            continue;
        }

        let chunks = match store.list_session(session_id).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "hydrate: failed to list chunks");
                continue;
            }
        };
        if chunks.is_empty() {
            continue;
        }

        let mut record = SessionRecord::rehydrated(session_id.to_string());
        for (index, size) in chunks {
            record.chunk_sizes.insert(index, size);
            record.chunk_offsets.insert(index, size);
            record.chunks_persisted.insert(index);
        }
        tracing::info!(session_id, chunks = record.chunks_persisted.len(), "hydrated session from disk");
        out.insert(session_id.to_string(), record);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn hydrates_chunks_persisted_from_disk() {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(
            tmp.path().to_path_buf(),
            wavecap_core::identifier::DEFAULT_SESSION_ID_ALPHABET.to_string(),
        );
        store.append_at("s1", 0, 0, b"hello").await.unwrap();
        store.append_at("s1", 1, 0, b"world!").await.unwrap();

        let records = hydrate_from_disk(&store).await;
        let rec = records.get("s1").unwrap();
        assert!(!rec.metadata_known);
        assert_eq!(rec.chunks_persisted.len(), 2);
        assert_eq!(rec.chunk_sizes[&0], 5);
        assert_eq!(rec.chunk_sizes[&1], 6);
    }

    #[tokio::test]
    async fn ignores_sessions_with_no_chunks() {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(
            tmp.path().to_path_buf(),
            wavecap_core::identifier::DEFAULT_SESSION_ID_ALPHABET.to_string(),
        );
        tokio::fs::create_dir_all(tmp.path().join("s1").join("completed"))
            .await
            .unwrap();

        let records = hydrate_from_disk(&store).await;
        assert!(records.is_empty());
    }
}
