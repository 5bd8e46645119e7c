//! Runtime configuration.
//!
//! Durations are stored in milliseconds so the configuration reads naturally
//! from TOML:
//!
//! ```toml
//! preference_flush_delay_ms = 2000
//! registry_prefs_delay_ms = 10000
//! request_timeout_ms = 5000
//! mailbox_capacity = 1024 # optional; unbounded when missing
//! preferences_file = "/home/user/.config/attrsync/prefs.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use attrsync_core::{ActorConfig, RequestTimeout};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_PREFERENCE_FLUSH_DELAY_MS: u64 = 2_000;
const DEFAULT_REGISTRY_PREFS_DELAY_MS: u64 = 10_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Settings shared by every actor of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Delay between the last value change of a preference-backed attribute
    /// and the write to the preference store.
    pub preference_flush_delay_ms: u64,
    /// Delay before a preference-backed model is pushed to the store.
    pub registry_prefs_delay_ms: u64,
    /// Timeout for blocking requests. Zero waits forever.
    pub request_timeout_ms: u64,
    /// Mailbox capacity of every spawned actor. Unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_capacity: Option<usize>,
    /// JSON file backing the preference store.
    pub preferences_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preference_flush_delay_ms: DEFAULT_PREFERENCE_FLUSH_DELAY_MS,
            registry_prefs_delay_ms: DEFAULT_REGISTRY_PREFS_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            mailbox_capacity: None,
            preferences_file: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file.
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn preference_flush_delay(mut self, delay: Duration) -> Self {
        self.preference_flush_delay_ms = duration_ms(delay);
        self
    }

    pub fn registry_prefs_delay(mut self, delay: Duration) -> Self {
        self.registry_prefs_delay_ms = duration_ms(delay);
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_ms = timeout.map_or(0, duration_ms);
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity.max(1));
        self
    }

    pub fn preferences_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_file = Some(path.into());
        self
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.preference_flush_delay_ms)
    }

    pub fn prefs_push_delay(&self) -> Duration {
        Duration::from_millis(self.registry_prefs_delay_ms)
    }

    /// The timeout policy used for blocking requests.
    pub fn timeout(&self) -> RequestTimeout {
        match self.request_timeout_ms {
            0 => RequestTimeout::Infinite,
            ms => RequestTimeout::After(Duration::from_millis(ms)),
        }
    }

    /// Actor configuration with the configured mailbox capacity.
    pub fn actor(&self, name: impl Into<String>) -> ActorConfig {
        let config = ActorConfig::with_name(name);
        match self.mailbox_capacity {
            Some(capacity) => config.queue_capacity(capacity),
            None => config,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
