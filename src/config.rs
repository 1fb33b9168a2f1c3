//! Configuration file parser for ~/.config/feedmux/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which serves nothing but still answers requests. Unknown top-level keys
//! are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::server::{check_path, ServerError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid pipe {path:?}: {reason}")]
    InvalidPipe { path: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen: String,

    /// Whole-request timeout for source fetches, in seconds.
    pub request_timeout_secs: u64,

    /// TCP connect timeout for source fetches, in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum accepted size of a source feed body, in bytes.
    pub max_feed_size: usize,

    /// User-Agent header sent to sources.
    pub user_agent: String,

    /// Served feeds, one `[[pipe]]` table each.
    #[serde(rename = "pipe")]
    pub pipes: Vec<PipeConfig>,
}

/// One `[[pipe]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// URL path the merged feed is served at, e.g. `/news.rss`.
    pub path: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// Feed URLs (`http://`, `https://`) or local file paths.
    pub sources: Vec<String>,
    /// Items whose title contains any of these (case-insensitive) are dropped.
    pub exclude: Vec<String>,
    /// Keep only this many of the newest items.
    pub limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_feed_size: 10 * 1024 * 1024,
            user_agent: concat!("feedmux/", env!("CARGO_PKG_VERSION")).to_string(),
            pipes: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "listen",
        "request_timeout_secs",
        "connect_timeout_secs",
        "max_feed_size",
        "user_agent",
        "pipe",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    /// - Pipe path not a literal `/`-rooted route, duplicate paths, or no sources → `Err(ConfigError::InvalidPipe)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), pipes = config.pipes.len(), "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for pipe in &self.pipes {
            let invalid = |reason: &str| ConfigError::InvalidPipe {
                path: pipe.path.clone(),
                reason: reason.to_string(),
            };

            if let Err(ServerError::InvalidPath { reason, .. }) = check_path(&pipe.path) {
                return Err(invalid(reason));
            }
            if !seen.insert(pipe.path.as_str()) {
                return Err(invalid("path is used by more than one pipe"));
            }
            if pipe.sources.is_empty() {
                return Err(invalid("at least one source is required"));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::Builder::new().prefix(name).tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_feed_size, 10 * 1024 * 1024);
        assert!(config.user_agent.starts_with("feedmux/"));
        assert!(config.pipes.is_empty());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.listen, "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (_dir, path) = write_config("feedmux_config_empty", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert!(config.pipes.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
listen = "0.0.0.0:9000"
request_timeout_secs = 5
connect_timeout_secs = 2
max_feed_size = 4096
user_agent = "test-agent"

[[pipe]]
path = "/news.rss"
title = "News"
link = "https://example.com/"
description = "All the news"
sources = ["https://example.com/a.rss", "/var/feeds/b.rss"]
exclude = ["sponsored"]
limit = 50

[[pipe]]
path = "/other.rss"
sources = ["https://example.org/feed"]
"#;
        let (_dir, path) = write_config("feedmux_config_full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_feed_size, 4096);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.pipes.len(), 2);

        let news = &config.pipes[0];
        assert_eq!(news.path, "/news.rss");
        assert_eq!(news.title, "News");
        assert_eq!(news.sources.len(), 2);
        assert_eq!(news.exclude, vec!["sponsored".to_string()]);
        assert_eq!(news.limit, Some(50));

        let other = &config.pipes[1];
        assert!(other.title.is_empty());
        assert_eq!(other.limit, None);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("feedmux_config_invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config(
            "feedmux_config_unknown",
            "listen = \"127.0.0.1:1234\"\ntotally_fake_key = 42\n",
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen, "127.0.0.1:1234");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (_dir, path) = write_config("feedmux_config_wrongtype", "listen = 42\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_pipe_validation() {
        let cases = [
            "[[pipe]]\npath = \"news.rss\"\nsources = [\"https://a\"]\n",
            "[[pipe]]\npath = \"/:feed\"\nsources = [\"https://a\"]\n",
            "[[pipe]]\npath = \"/feeds/{name}\"\nsources = [\"https://a\"]\n",
            "[[pipe]]\npath = \"/news.rss\"\n",
            "[[pipe]]\npath = \"/a\"\nsources = [\"https://a\"]\n[[pipe]]\npath = \"/a\"\nsources = [\"https://b\"]\n",
        ];
        for content in cases {
            let (_dir, path) = write_config("feedmux_config_pipe", content);
            let err = Config::load(&path).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPipe { .. }), "{content}");
        }
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config("feedmux_config_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }
}
