use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, VaultError};

/// Engine configuration file format (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub kdf: KdfConfig,
    #[serde(default)]
    pub breach: BreachConfig,
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub passkey: PasskeyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// PBKDF2 iteration count for the master-credential verifier.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachConfig {
    /// Base URL of the breach range index.
    #[serde(default = "default_breach_url")]
    pub base_url: String,
    /// How long a prefix:suffix result stays cached.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: i64,
    /// Per-request timeout for range queries.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            base_url: default_breach_url(),
            cache_ttl_hours: default_cache_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Logins untouched for longer than this count as "old".
    #[serde(default = "default_max_age")]
    pub max_password_age_days: i64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            max_password_age_days: default_max_age(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyConfig {
    /// Relying-party identifier passkeys are scoped to.
    #[serde(default = "default_rp_id")]
    pub relying_party_id: String,
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            relying_party_id: default_rp_id(),
        }
    }
}

fn default_iterations() -> u32 {
    600_000
}

fn default_breach_url() -> String {
    "https://api.pwnedpasswords.com".to_string()
}

fn default_cache_ttl() -> i64 {
    24
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_age() -> i64 {
    90
}

fn default_rp_id() -> String {
    "cube.app".to_string()
}

impl EngineConfig {
    /// Load config from a path. Returns default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    /// Save config to a path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| VaultError::Serialization(e.to_string()))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EngineConfig::load(&dir.path().join("engine.toml")).unwrap();
        assert_eq!(config.kdf.iterations, 600_000);
        assert_eq!(config.breach.cache_ttl_hours, 24);
        assert_eq!(config.score.max_password_age_days, 90);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.breach.cache_ttl_hours = 6;
        config.passkey.relying_party_id = "example.com".into();
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.breach.cache_ttl_hours, 6);
        assert_eq!(loaded.passkey.relying_party_id, "example.com");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[kdf]\niterations = 100000\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.kdf.iterations, 100_000);
        assert_eq!(config.breach.request_timeout_secs, 10);
    }
}
