//! Configuration
//!
//! Loaded from `~/.lochat/config.toml`. Every field is optional; the
//! `OLLAMA_HOST` environment variable overrides the host, and command-line
//! flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::markdown::RenderTheme;
use crate::ollama::DEFAULT_HOST;

pub const HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Ollama server
    pub host: String,
    /// Model to use; the first installed model when unset
    pub model: Option<String>,
    pub request_timeout_secs: u64,
    pub list_timeout_secs: u64,
    /// Render theme name (`midnight`, `daylight`)
    pub theme: String,
    /// Where the chat transcript HTML is written after every chunk
    pub transcript_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: None,
            request_timeout_secs: 120,
            list_timeout_secs: 5,
            theme: "midnight".to_string(),
            transcript_path: None,
        }
    }
}

/// `~/.lochat`
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lochat"))
}

/// `~/.lochat/config.toml`
pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.host = normalize_host(&config.host);
        Ok(config)
    }

    /// Apply `OLLAMA_HOST` if set
    pub fn apply_env(self) -> Self {
        match std::env::var(HOST_ENV) {
            Ok(host) if !host.trim().is_empty() => self.with_host_override(&host),
            _ => self,
        }
    }

    pub fn with_host_override(mut self, host: &str) -> Self {
        self.host = normalize_host(host);
        self
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        if model.is_some() {
            self.model = model;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs.max(1))
    }

    /// Configured theme, falling back to the default for unknown names
    pub fn theme(&self) -> RenderTheme {
        RenderTheme::find(&self.theme).cloned().unwrap_or_default()
    }
}

/// `localhost:11434` -> `http://localhost:11434`, trailing slash removed
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.list_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            host = "gpu-box:11434/"
            model = "llama3.2"
            theme = "daylight"
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "http://gpu-box:11434");
        assert_eq!(config.model.as_deref(), Some("llama3.2"));
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.theme().name, "daylight");
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let config = Config::from_toml("theme = \"neon\"").unwrap();
        assert_eq!(config.theme().name, "midnight");
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::from_toml("request_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "list_timeout_secs = 2").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.list_timeout(), Duration::from_secs(2));

        let missing = file.path().with_extension("missing");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_host_override("https://remote:8080/")
            .with_model_override(Some("qwen".to_string()))
            .with_model_override(None);
        assert_eq!(config.host, "https://remote:8080");
        assert_eq!(config.model.as_deref(), Some("qwen"));
    }
}
