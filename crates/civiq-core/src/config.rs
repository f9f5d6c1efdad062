//! Configuration for civiq
//!
//! TOML with a section per concern. Every field has a default, so a
//! missing or partial file always yields a runnable config.
//!
//! Discovery order: an explicit path, then `CIVIQ_CONFIG`, then
//! `./civiq.toml`, then built-in defaults. `CIVIQ_PORT` overrides the
//! configured port either way. The OpenAI key is never stored in the
//! file; it comes from `OPENAI_API_KEY`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var naming an alternate config file
pub const CONFIG_ENV: &str = "CIVIQ_CONFIG";

/// Env var overriding the server port
pub const PORT_ENV: &str = "CIVIQ_PORT";

/// Env var holding the OpenAI API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const CONFIG_FILE: &str = "civiq.toml";

/// civiq configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Record store settings
    pub storage: StorageConfig,

    /// AI categorization settings
    pub classifier: ClassifierConfig,

    /// Photo upload settings
    pub media: MediaConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Which record store backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSONL file per table under the data dir
    #[default]
    Jsonl,
    /// Nothing survives the process
    Memory,
}

/// Record store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Directory holding the JSONL tables
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Jsonl,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// AI categorization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Turn background categorization on or off
    pub enabled: bool,

    /// OpenAI-compatible API root
    pub api_base: String,

    /// Chat completions model
    pub model: String,

    /// Request timeout for a single classification call
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-5".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Photo upload settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory photos are written to and served from
    pub upload_dir: PathBuf,

    /// Largest accepted photo in bytes
    pub max_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load config from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve config for this invocation.
    ///
    /// An explicit path (or `CIVIQ_CONFIG`) must exist; `./civiq.toml` is
    /// optional. `CIVIQ_PORT` wins over whatever the file says.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match named {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load(&path)?
            }
            None => Self::load(Path::new(CONFIG_FILE))?,
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid {PORT_ENV}: {port}")))?;
        }

        Ok(config)
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# civiq configuration

[server]
# Bind address for the API server
host = "127.0.0.1"

# Bind port (CIVIQ_PORT overrides this)
port = 5000

[storage]
# Record store backend: "jsonl" (durable) or "memory" (ephemeral)
backend = "jsonl"

# Directory holding issues.jsonl, comments.jsonl and users.jsonl
data_dir = "data"

[classifier]
# Background AI categorization of new issues.
# Needs OPENAI_API_KEY in the environment; without it the server runs
# with categorization off.
enabled = true

# OpenAI-compatible API root
api_base = "https://api.openai.com/v1"

# Chat completions model
model = "gpt-5"

# Timeout for a single classification call, in seconds
timeout_secs = 30

[media]
# Directory uploaded photos are written to and served from
upload_dir = "uploads"

# Largest accepted photo in bytes (10 MiB)
max_bytes = 10485760
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
port = 9090

[classifier]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.classifier.enabled);
        assert_eq!(config.classifier.model, "gpt-5");
        assert_eq!(config.storage.backend, StorageBackend::Jsonl);
        assert_eq!(config.media.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_commented_default_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::default_with_comments()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civiq.toml");

        let mut config = Config::default();
        config.server.port = 7070;
        config.storage.backend = StorageBackend::Memory;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/civiq.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_discover_rejects_missing_explicit_path() {
        let err = Config::discover(Some(Path::new("/nonexistent/civiq.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
