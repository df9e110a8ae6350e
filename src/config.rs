//! Configuration for the chat client and the offline asset cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::cache::AssetManifest;
use crate::error::{Error, Result};
use crate::input::MAX_MESSAGE_CHARS;

/// Environment variable overriding [`ChatConfig::server_url`].
pub const SERVER_ENV: &str = "MEDICHAT_SERVER";

/// Settings for the streaming chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the chat server.
    pub server_url: String,
    /// Path of the event-stream endpoint, relative to `server_url`.
    pub endpoint: String,
    /// Longest message accepted, in characters.
    pub max_message_chars: usize,
    /// Seconds from send until an unfinished exchange is closed.
    pub response_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            endpoint: "/get".to_string(),
            max_message_chars: MAX_MESSAGE_CHARS,
            response_timeout_secs: 15,
        }
    }
}

impl ChatConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Sets the event-stream endpoint path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the maximum message length.
    #[must_use]
    pub const fn with_max_message_chars(mut self, max: usize) -> Self {
        self.max_message_chars = max;
        self
    }

    /// Sets the response timeout in seconds.
    #[must_use]
    pub const fn with_response_timeout_secs(mut self, secs: u64) -> Self {
        self.response_timeout_secs = secs;
        self
    }

    /// Response timeout as a [`Duration`].
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Full URL of the event-stream endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the server URL or endpoint cannot be parsed.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.server_url)
            .and_then(|base| base.join(&self.endpoint))
            .map_err(|e| Error::Url(format!("{}{}: {e}", self.server_url, self.endpoint)))
    }
}

/// Settings for the offline asset cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Origin that relative manifest entries resolve against.
    /// Falls back to the chat server URL when unset.
    pub origin: Option<String>,
    /// Directory holding the cache buckets.
    pub cache_dir: PathBuf,
    /// Assets to pre-cache and the bucket name they are stored under.
    pub manifest: AssetManifest,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            origin: None,
            cache_dir: cache_dir.join("medichat"),
            manifest: AssetManifest::default(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medichat")
            .join("config.toml")
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from `path`, using defaults when the file is
    /// missing, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        if let Ok(server) = std::env::var(SERVER_ENV) {
            config.chat.server_url = server;
        }
        Ok(config)
    }

    /// Origin the asset manifest resolves against.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the origin cannot be parsed.
    pub fn cache_origin(&self) -> Result<Url> {
        let origin = self.cache.origin.as_deref().unwrap_or(&self.chat.server_url);
        Url::parse(origin).map_err(|e| Error::Url(format!("{origin}: {e}")))
    }
}
