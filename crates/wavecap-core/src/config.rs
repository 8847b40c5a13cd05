//! Configuration system for wavecap.
//!
//! Resolution order: config file → environment variables → defaults.
//!
//! Config file location:
//!   1. $WAVECAP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/wavecap/config.toml
//!   3. ~/.config/wavecap/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::identifier::DEFAULT_SESSION_ID_ALPHABET;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WavecapConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub sweeper: SweeperConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for all session data.
    pub storage_root: PathBuf,
    /// Cap for a single append body, in bytes.
    pub max_chunk_bytes: u64,
    /// Allowed characters for session identifiers.
    pub session_identifier_alphabet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Inactivity window, in seconds, before an active session is swept.
    pub session_ttl_active_secs: u64,
    /// Retention, in seconds, for completed artifacts.
    pub session_ttl_completed_secs: u64,
    /// Period, in seconds, between sweeper passes.
    pub sweeper_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Streaming-copy buffer size during assembly, in bytes.
    pub assembly_buffer_bytes: usize,
    /// Initial backoff, in seconds, for the Completion Coordinator's retry loop.
    pub completion_retry_initial_secs: u64,
    /// Backoff cap, in seconds, for the Completion Coordinator's retry loop.
    pub completion_retry_max_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for WavecapConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            sweeper: SweeperConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_root: data_dir().join("sessions"),
            max_chunk_bytes: 8 * 1024 * 1024, // 8 MiB
            session_identifier_alphabet: DEFAULT_SESSION_ID_ALPHABET.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            session_ttl_active_secs: 6 * 3600,
            session_ttl_completed_secs: 7 * 24 * 3600,
            sweeper_interval_secs: 3600,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            assembly_buffer_bytes: 1024 * 1024, // 1 MiB
            completion_retry_initial_secs: 3,
            completion_retry_max_secs: 60,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("wavecap")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("wavecap")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl WavecapConfig {
    /// Load config: file → env vars → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            WavecapConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("WAVECAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&WavecapConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply WAVECAP_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WAVECAP_STORAGE__STORAGE_ROOT") {
            self.storage.storage_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WAVECAP_STORAGE__MAX_CHUNK_BYTES") {
            if let Ok(n) = v.parse() {
                self.storage.max_chunk_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_STORAGE__SESSION_IDENTIFIER_ALPHABET") {
            self.storage.session_identifier_alphabet = v;
        }
        if let Ok(v) = std::env::var("WAVECAP_SERVER__BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("WAVECAP_SERVER__PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_SWEEPER__SESSION_TTL_ACTIVE_SECS") {
            if let Ok(n) = v.parse() {
                self.sweeper.session_ttl_active_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_SWEEPER__SESSION_TTL_COMPLETED_SECS") {
            if let Ok(n) = v.parse() {
                self.sweeper.session_ttl_completed_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_SWEEPER__SWEEPER_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.sweeper.sweeper_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_COMPLETION__ASSEMBLY_BUFFER_BYTES") {
            if let Ok(n) = v.parse() {
                self.completion.assembly_buffer_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_COMPLETION__COMPLETION_RETRY_INITIAL_SECS") {
            if let Ok(n) = v.parse() {
                self.completion.completion_retry_initial_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAVECAP_COMPLETION__COMPLETION_RETRY_MAX_SECS") {
            if let Ok(n) = v.parse() {
                self.completion.completion_retry_max_secs = n;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = WavecapConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.storage.max_chunk_bytes > 0);
        assert!(!config.storage.session_identifier_alphabet.is_empty());
    }

    #[test]
    fn apply_env_overrides_changes_port() {
        let mut config = WavecapConfig::default();
        assert_eq!(config.server.port, 8080);

        // Simulate what apply_env_overrides does when WAVECAP_SERVER__PORT=9090
        config.server.port = 9090;
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("wavecap-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("WAVECAP_CONFIG", config_path.to_str().unwrap());
        }

        let path =
            WavecapConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = WavecapConfig::load().expect("load should succeed");
        assert_eq!(config.server.port, 8080);

        unsafe {
            std::env::remove_var("WAVECAP_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
