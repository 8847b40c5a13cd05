//! Session Registry — the process-wide map from session identifier to
//! session record. All mutation goes through `update`, which serializes per
//! key; updates on distinct sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use wavecap_core::session::{now_ms, SessionRecord};

pub type SessionMap = Arc<DashMap<String, SessionRecord>>;

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: SessionMap,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Looks up a session by id, inserting `make` if absent.
    pub fn get_or_create(&self, session_id: &str, make: impl FnOnce() -> SessionRecord) -> SessionRecord {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(make)
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.get(session_id).map(|r| r.clone())
    }

    /// Applies `f` to the record in place and returns whatever `f` returns.
    /// `None` if the session does not exist.
    pub fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R> {
        let mut entry = self.sessions.get_mut(session_id)?;
        Some(f(&mut entry))
    }

    pub fn insert(&self, record: SessionRecord) {
        self.sessions.insert(record.session_id.clone(), record);
    }

    pub fn delete(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.remove(session_id).map(|(_, v)| v)
    }

    /// Atomically removes the session iff `predicate` holds, holding the
    /// same per-key lock `update` uses so the check and the removal can
    /// never be split by a concurrent `update` (e.g. the assembler's
    /// pending-to-in-progress CAS).
    pub fn remove_if(&self, session_id: &str, predicate: impl FnOnce(&SessionRecord) -> bool) -> Option<SessionRecord> {
        self.sessions
            .remove_if(session_id, |_, rec| predicate(rec))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter_all(&self) -> Vec<SessionRecord> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    /// Sessions whose `last_activity_at` predates `now - ttl_secs` and whose
    /// `assembly_state` is not `in_progress`.
    pub fn iter_expired_active(&self, ttl_secs: u64) -> Vec<SessionRecord> {
        let cutoff = now_ms().saturating_sub(ttl_secs * 1000);
        self.sessions
            .iter()
            .filter(|e| {
                e.value().last_activity_at < cutoff
                    && e.value().assembly_state != wavecap_core::session::AssemblyState::InProgress
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Completed sessions whose retention window has elapsed.
    pub fn iter_expired_completed(&self, ttl_secs: u64) -> Vec<SessionRecord> {
        let cutoff = now_ms().saturating_sub(ttl_secs * 1000);
        self.sessions
            .iter()
            .filter(|e| {
                e.value().assembly_state == wavecap_core::session::AssemblyState::Done
                    && e.value().completed_at.is_some_and(|c| c < cutoff)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Bulk-loads rehydrated records at startup, never overwriting a
    /// session that is somehow already present.
    pub fn hydrate(&self, records: HashMap<String, SessionRecord>) {
        for (id, record) in records {
            self.sessions.entry(id).or_insert(record);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavecap_core::session::AssemblyState;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(id.to_string(), 2, None, "demo.webm".into(), "webm".into(), HashMap::new())
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("s1", || record("s1"));
        let b = registry.get_or_create("s1", || panic!("should not construct twice"));
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn update_mutates_in_place() {
        let registry = SessionRegistry::new();
        registry.insert(record("s1"));
        registry.update("s1", |rec| rec.mark_chunk_persisted(0, 100));
        let rec = registry.get("s1").unwrap();
        assert!(rec.chunks_persisted.contains(&0));
    }

    #[test]
    fn update_on_unknown_session_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry.update("missing", |_| ()).is_none());
    }

    #[test]
    fn delete_removes_record() {
        let registry = SessionRegistry::new();
        registry.insert(record("s1"));
        assert!(registry.delete("s1").is_some());
        assert!(registry.get("s1").is_none());
    }

    #[test]
    fn remove_if_skips_when_predicate_fails() {
        let registry = SessionRegistry::new();
        let mut rec = record("s1");
        rec.assembly_state = AssemblyState::InProgress;
        registry.insert(rec);

        let removed = registry.remove_if("s1", |r| r.assembly_state != AssemblyState::InProgress);
        assert!(removed.is_none());
        assert!(registry.get("s1").is_some());
    }

    #[test]
    fn remove_if_removes_when_predicate_holds() {
        let registry = SessionRegistry::new();
        registry.insert(record("s1"));

        let removed = registry.remove_if("s1", |r| r.assembly_state != AssemblyState::InProgress);
        assert!(removed.is_some());
        assert!(registry.get("s1").is_none());
    }

    #[test]
    fn in_progress_sessions_are_never_expired() {
        let registry = SessionRegistry::new();
        let mut rec = record("s1");
        rec.last_activity_at = 0;
        rec.assembly_state = AssemblyState::InProgress;
        registry.insert(rec);
        assert!(registry.iter_expired_active(1).is_empty());
    }

    #[test]
    fn stale_active_session_is_expired() {
        let registry = SessionRegistry::new();
        let mut rec = record("s1");
        rec.last_activity_at = 0;
        registry.insert(rec);
        assert_eq!(registry.iter_expired_active(1).len(), 1);
    }
}
