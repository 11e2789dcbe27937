//! Configuration module for Mitter

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{Credentials, DEFAULT_SERVER, Session};
use crate::http::{UreqTransport, WorkerPool};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Account name
    #[serde(default)]
    pub username: String,

    /// Account password
    #[serde(default)]
    pub password: String,

    /// Talk to the server over HTTPS
    #[serde(default)]
    pub https: bool,

    /// Number of HTTP workers (1 = no background threads)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Server host, with optional port
    #[serde(default = "default_server")]
    pub server: String,

    /// Request timeout in seconds (0 = wait forever)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Newest friends-timeline status already shown on the console
    #[serde(default)]
    pub last_id: u64,

    /// Newest reply already shown on the console
    #[serde(default)]
    pub last_reply: u64,
}

fn default_workers() -> usize {
    2
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            https: false,
            workers: default_workers(),
            server: default_server(),
            timeout_secs: 0,
            last_id: 0,
            last_reply: 0,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("mitter");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path.
    ///
    /// The file holds the password, so it is only readable by its owner.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict config file permissions")?;
        }

        Ok(())
    }

    /// Whether credentials have been filled in
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Credentials stored in this config
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, self.https)
    }

    /// Open a session with `workers` workers, using the configured server
    /// and timeout
    pub fn session(&self, workers: usize) -> Session {
        let transport = if self.timeout_secs > 0 {
            UreqTransport::with_timeout(Duration::from_secs(self.timeout_secs))
        } else {
            UreqTransport::new()
        };
        let pool = WorkerPool::with_transport(workers, Arc::new(transport));
        Session::with_pool(self.credentials(), &self.server, pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.has_credentials());
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mitter").join("config.toml");

        let config = Config {
            username: "julio".to_string(),
            password: "secret".to_string(),
            https: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.credentials().https);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "username = \"deepak\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.username, "deepak");
        assert!(!config.https);
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!((config.last_id, config.last_reply), (0, 0));
    }

    #[test]
    fn test_seen_markers_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config {
            username: "julio".to_string(),
            last_id: 1234,
            last_reply: 99,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_id, 1234);
        assert_eq!(loaded.last_reply, 99);
    }
}
