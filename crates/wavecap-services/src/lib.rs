//! wavecap-services — the stateful engine: chunk storage, the session
//! registry, and the background workers (Assembler, Completion Coordinator,
//! Sweeper) that drive a session from upload to assembled artifact.

pub mod assembler;
pub mod chunk_store;
pub mod completion_coordinator;
pub mod hydrate;
pub mod session_registry;
pub mod sweeper;

pub use assembler::Assembler;
pub use chunk_store::ChunkStore;
pub use completion_coordinator::CompletionCoordinator;
pub use session_registry::SessionRegistry;
