//! Sweeper — periodically reclaims storage from abandoned or
//! retention-expired sessions (§4.6). Never touches an `in_progress` session.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::chunk_store::ChunkStore;
use crate::session_registry::SessionRegistry;

/// Runs until `shutdown` fires, sweeping once per `interval_secs`.
pub async fn run(
    registry: SessionRegistry,
    store: ChunkStore,
    ttl_active_secs: u64,
    ttl_completed_secs: u64,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("sweeper stopping on shutdown signal");
                return;
            }
            _ = interval.tick() => {
                sweep_once(&registry, &store, ttl_active_secs, ttl_completed_secs).await;
            }
        }
    }
}

async fn sweep_once(
    registry: &SessionRegistry,
    store: &ChunkStore,
    ttl_active_secs: u64,
    ttl_completed_secs: u64,
) {
    let expired_active = registry.iter_expired_active(ttl_active_secs);
    for record in &expired_active {
        if let Err(err) = store.delete_session(&record.session_id).await {
            tracing::warn!(session_id = %record.session_id, error = %err, "sweep: failed to delete session directory");
            continue;
        }
        registry.delete(&record.session_id);
        tracing::info!(session_id = %record.session_id, "sweep: removed expired active session");
    }

    let expired_completed = registry.iter_expired_completed(ttl_completed_secs);
    for record in &expired_completed {
        if let Err(err) = store.delete_session(&record.session_id).await {
            tracing::warn!(session_id = %record.session_id, error = %err, "sweep: failed to delete completed artifact");
            continue;
        }
        registry.delete(&record.session_id);
        tracing::info!(session_id = %record.session_id, "sweep: removed retention-expired artifact");
    }

    if !expired_active.is_empty() || !expired_completed.is_empty() {
        tracing::debug!(
            removed_active = expired_active.len(),
            removed_completed = expired_completed.len(),
            remaining = registry.len(),
            "sweep complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use wavecap_core::session::{AssemblyState, SessionRecord};

    fn setup() -> (TempDir, SessionRegistry, ChunkStore) {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(
            tmp.path().to_path_buf(),
            wavecap_core::identifier::DEFAULT_SESSION_ID_ALPHABET.to_string(),
        );
        (tmp, SessionRegistry::new(), store)
    }

    #[tokio::test]
    async fn sweeps_stale_active_session() {
        let (_tmp, registry, store) = setup();
        store.append_at("s1", 0, 0, b"hi").await.unwrap();
        let mut rec = SessionRecord::new("s1".into(), 1, None, "d.webm".into(), "webm".into(), HashMap::new());
        rec.last_activity_at = 0;
        registry.insert(rec);

        sweep_once(&registry, &store, 1, 3600).await;

        assert!(registry.get("s1").is_none());
        assert!(store.list_session("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn never_sweeps_in_progress_session() {
        let (_tmp, registry, store) = setup();
        let mut rec = SessionRecord::new("s1".into(), 1, None, "d.webm".into(), "webm".into(), HashMap::new());
        rec.last_activity_at = 0;
        rec.assembly_state = AssemblyState::InProgress;
        registry.insert(rec);

        sweep_once(&registry, &store, 1, 3600).await;

        assert!(registry.get("s1").is_some());
    }

    #[tokio::test]
    async fn sweeps_retention_expired_completed_artifact() {
        let (_tmp, registry, store) = setup();
        let mut rec = SessionRecord::new("s1".into(), 1, None, "d.webm".into(), "webm".into(), HashMap::new());
        rec.assembly_state = AssemblyState::Done;
        rec.completed_at = Some(0);
        registry.insert(rec);

        sweep_once(&registry, &store, 3600, 1).await;

        assert!(registry.get("s1").is_none());
    }
}
