//! Shared state handed to every handler via axum's `State` extractor.

use std::sync::Arc;

use wavecap_core::config::WavecapConfig;
use wavecap_services::{Assembler, ChunkStore, CompletionCoordinator, SessionRegistry};

#[derive(Clone)]
pub struct ApiState {
    pub registry: SessionRegistry,
    pub store: ChunkStore,
    pub assembler: Arc<Assembler>,
    pub completion: Arc<CompletionCoordinator>,
    pub config: Arc<WavecapConfig>,
}
