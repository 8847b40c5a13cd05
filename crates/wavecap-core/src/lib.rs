//! wavecap-core — shared types, configuration, and error taxonomy.
//! All other wavecap crates depend on this one.

pub mod config;
pub mod error;
pub mod identifier;
pub mod session;

pub use config::WavecapConfig;
pub use error::CoreError;
pub use session::{AssemblyResult, AssemblyState, SessionRecord};
