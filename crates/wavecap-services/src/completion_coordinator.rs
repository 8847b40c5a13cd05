//! Completion Coordinator — accepts "all chunks queued" and triggers the
//! Assembler once every chunk is actually persisted, tolerating the signal
//! arriving before, with, or after the last data chunk (§4.5).

use std::sync::Arc;
use std::time::Duration;

use wavecap_core::error::CoreError;
use wavecap_core::session::{now_ms, AssemblyState};

use crate::assembler::Assembler;
use crate::session_registry::SessionRegistry;

pub struct CompletionCoordinator {
    registry: SessionRegistry,
    assembler: Arc<Assembler>,
    retry_initial_secs: u64,
    retry_max_secs: u64,
    session_ttl_active_secs: u64,
}

impl CompletionCoordinator {
    pub fn new(
        registry: SessionRegistry,
        assembler: Arc<Assembler>,
        retry_initial_secs: u64,
        retry_max_secs: u64,
        session_ttl_active_secs: u64,
    ) -> Self {
        Self {
            registry,
            assembler,
            retry_initial_secs,
            retry_max_secs,
            session_ttl_active_secs,
        }
    }

    /// Handles the completion signal (or an equivalent manual "assemble"
    /// trigger — both funnel through here, satisfying §4.3f's idempotency
    /// requirement). Returns the `assembly_state` after the transition.
    pub fn signal(self: &Arc<Self>, session_id: &str) -> Result<AssemblyState, CoreError> {
        let outcome = self.registry.update(session_id, |rec| {
            rec.completion_signalled = true;
            if rec.assembly_state == AssemblyState::None {
                rec.assembly_state = AssemblyState::Pending;
            }
            rec.touch();
            (rec.is_complete(), rec.assembly_state)
        });
        let (all_present, state) = outcome.ok_or(CoreError::UnknownSession)?;

        if all_present && state == AssemblyState::Pending {
            self.assembler.spawn_assembly(session_id.to_string());
        } else if state == AssemblyState::Pending {
            self.spawn_retry_loop(session_id.to_string());
        }
        Ok(state)
    }

    fn spawn_retry_loop(self: &Arc<Self>, session_id: String) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut backoff = this.retry_initial_secs.max(1);
            let deadline = now_ms() + this.session_ttl_active_secs * 1000;

            loop {
                tokio::time::sleep(Duration::from_secs(backoff)).await;

                let Some(record) = this.registry.get(&session_id) else {
                    return; // cancelled or swept
                };
                if record.assembly_state != AssemblyState::Pending {
                    return; // already progressed (or regressed) past our concern
                }
                if record.is_complete() {
                    this.assembler.spawn_assembly(session_id.clone());
                    return;
                }
                if now_ms() >= deadline {
                    this.registry.update(&session_id, |rec| {
                        rec.assembly_state = wavecap_core::session::AssemblyState::Failed;
                        rec.assembly_result = Some(wavecap_core::session::AssemblyResult::Error(
                            "completion retry window elapsed before all chunks arrived".into(),
                        ));
                    });
                    tracing::warn!(session_id, "completion retry window elapsed");
                    return;
                }
                tracing::debug!(session_id, backoff, "completion retry: chunks still missing");
                backoff = (backoff * 2).min(this.retry_max_secs);
            }
        });
    }
}
