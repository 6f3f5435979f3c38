//! Runtime configuration (spec.md §6, persisted-state list): one TOML file
//! with per-subsystem sub-tables, each field overridable by an environment
//! variable. Mirrors the teacher's `runtime/src/config.rs` `Config`
//! top-level-with-sub-configs shape and its `FULCRUM_*`-prefixed env
//! override convention, narrowed to the subsystems this runtime actually
//! has: journal, permission, tools, scheduler, swarm, and the HTTP API.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the journal, schedule store and escrow ledger.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub enabled: bool,
    pub display_name: String,
    pub api_url: String,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self { enabled: false, display_name: "fulcrum-node".to_string(), api_url: "http://127.0.0.1:8080".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub swarm: SwarmConfig,
    pub scheduler: SchedulerTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerTuning {
    pub tick_interval_ms: u64,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self { tick_interval_ms: 500 }
    }
}

impl RuntimeConfig {
    /// Loads from `path` if it exists, else starts from defaults; either
    /// way every field can be overridden by a `FULCRUM_*` environment
    /// variable (teacher's config.rs env-override convention).
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?
        } else {
            RuntimeConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("FULCRUM_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = env::var("FULCRUM_API_PORT") {
            if let Ok(port) = port.parse() {
                self.api.port = port;
            }
        }
        if let Ok(dir) = env::var("FULCRUM_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(enabled) = env::var("FULCRUM_SWARM_ENABLED") {
            self.swarm.enabled = enabled == "1" || enabled.eq_ignore_ascii_case("true");
        }
        if let Ok(name) = env::var("FULCRUM_SWARM_DISPLAY_NAME") {
            self.swarm.display_name = name;
        }
        if let Ok(url) = env::var("FULCRUM_SWARM_API_URL") {
            self.swarm.api_url = url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::Invalid("api.port must be nonzero".to_string()));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_interval_ms must be nonzero".to_string()));
        }
        Ok(())
    }

    pub fn journal_path(&self) -> PathBuf {
        self.storage.data_dir.join("journal.ndjson")
    }

    pub fn schedule_store_path(&self) -> PathBuf {
        self.storage.data_dir.join("schedules.ndjson")
    }

    pub fn escrow_path(&self) -> PathBuf {
        self.storage.data_dir.join("escrow.ndjson")
    }

    pub fn permission_signing_secret(&self) -> Vec<u8> {
        env::var("FULCRUM_SIGNING_SECRET")
            .map(|s| s.into_bytes())
            .unwrap_or_else(|_| b"fulcrum-dev-signing-secret".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn rejects_zero_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fulcrum.toml");
        std::fs::write(&path, "[api]\nhost = \"0.0.0.0\"\nport = 0\n").unwrap();
        assert!(RuntimeConfig::load(&path).is_err());
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fulcrum.toml");
        std::fs::write(&path, "[api]\nhost = \"0.0.0.0\"\nport = 9000\n").unwrap();
        std::env::set_var("FULCRUM_API_PORT", "9100");
        let config = RuntimeConfig::load(&path).unwrap();
        std::env::remove_var("FULCRUM_API_PORT");
        assert_eq!(config.api.port, 9100);
    }
}
