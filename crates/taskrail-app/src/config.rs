//! Application configuration loaded from the user's config directory.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// File name looked up inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides the configured API base URL.
pub const ENV_API_URL: &str = "TASKRAIL_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Remote API settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Remote API settings block.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `https://tasks.example.com/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

impl AppConfig {
    /// Load configuration from `dir`, applying the [`ENV_API_URL`] override.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed, or
    /// when the resulting base URL is invalid.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_dir(dir)?;
        if let Ok(url) = std::env::var(ENV_API_URL) {
            config = config.with_base_url(url);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a known directory, without the env override.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed, or
    /// when the configured base URL is invalid.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the base URL, e.g. from a CLI flag or environment variable.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            bail!("api base URL must not be empty");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("api base URL '{url}' must start with http:// or https://");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn missing_config_returns_defaults() -> Result<()> {
        let dir = tempdir()?;
        let cfg = AppConfig::from_dir(dir.path())?;
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        Ok(())
    }

    #[test]
    fn base_url_is_read_from_the_file() -> Result<()> {
        let dir = tempdir()?;
        let mut file = fs::File::create(dir.path().join(CONFIG_FILE))?;
        writeln!(file, "[api]\nbase_url = \"https://tasks.example.com/api\"")?;

        let cfg = AppConfig::from_dir(dir.path())?;
        assert_eq!(cfg.api.base_url, "https://tasks.example.com/api");
        Ok(())
    }

    #[test]
    fn non_http_base_url_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut file = fs::File::create(dir.path().join(CONFIG_FILE))?;
        writeln!(file, "[api]\nbase_url = \"ftp://tasks.example.com\"")?;

        let Err(err) = AppConfig::from_dir(dir.path()) else {
            panic!("non-http scheme should error");
        };
        assert!(err.to_string().contains("must start with http"));
        Ok(())
    }

    #[test]
    fn empty_base_url_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut file = fs::File::create(dir.path().join(CONFIG_FILE))?;
        writeln!(file, "[api]\nbase_url = \"\"")?;

        assert!(AppConfig::from_dir(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn explicit_override_replaces_the_file_value() {
        let cfg = AppConfig::default().with_base_url("http://127.0.0.1:8080/api");
        assert_eq!(cfg.api.base_url, "http://127.0.0.1:8080/api");
    }
}
