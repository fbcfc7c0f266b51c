//! Store configuration via `verso.toml`
//!
//! A store can be built from defaults, from a TOML string, or from a config
//! file. On first use, `write_default_if_missing` drops a commented default
//! file next to the caller's data; edit it to change settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use verso_concurrency::LockConfig;
use verso_core::{Error, Result, DEFAULT_SESSION_ID};

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "verso.toml";

fn default_session_id() -> u64 {
    DEFAULT_SESSION_ID
}

fn default_lock_wait_timeout_ms() -> u64 {
    5_000
}

fn default_lock_max_hold_ms() -> u64 {
    50_000
}

/// Store configuration loaded from `verso.toml`.
///
/// # Example
///
/// ```toml
/// session_id = 1
/// lock_wait_timeout_ms = 5000
/// lock_max_hold_ms = 50000
/// validate_on_write = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Identifier namespace for nodes minted by this store.
    #[serde(default = "default_session_id")]
    pub session_id: u64,
    /// How long `acquire_lock` waits before rejecting, in milliseconds.
    #[serde(default = "default_lock_wait_timeout_ms")]
    pub lock_wait_timeout_ms: u64,
    /// How long a holder may keep the lock before it is force-released.
    #[serde(default = "default_lock_max_hold_ms")]
    pub lock_max_hold_ms: u64,
    /// Default `validate` flag for `DocumentStore::create`.
    #[serde(default)]
    pub validate_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            lock_wait_timeout_ms: default_lock_wait_timeout_ms(),
            lock_max_hold_ms: default_lock_max_hold_ms(),
            validate_on_write: false,
        }
    }
}

impl StoreConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for zero timeouts or a wait timeout longer
    /// than the max hold.
    pub fn validate(&self) -> Result<()> {
        if self.lock_wait_timeout_ms == 0 {
            return Err(Error::Config(
                "lock_wait_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.lock_max_hold_ms == 0 {
            return Err(Error::Config(
                "lock_max_hold_ms must be greater than zero".to_string(),
            ));
        }
        if self.lock_wait_timeout_ms > self.lock_max_hold_ms {
            return Err(Error::Config(format!(
                "lock_wait_timeout_ms ({}) must not exceed lock_max_hold_ms ({})",
                self.lock_wait_timeout_ms, self.lock_max_hold_ms
            )));
        }
        Ok(())
    }

    /// Lock timings as durations.
    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            wait_timeout: Duration::from_millis(self.lock_wait_timeout_ms),
            max_hold: Duration::from_millis(self.lock_max_hold_ms),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Verso store configuration
#
# Identifier namespace. Stores that exchange operations must use
# distinct session ids so generated identifiers never collide.
session_id = 1

# How long a caller waits for the store lock before giving up (ms).
lock_wait_timeout_ms = 5000

# A holder that keeps the lock longer than this is force-released (ms).
lock_max_hold_ms = 50000

# Run the schema validator on convenience writes by default.
validate_on_write = false
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds
    /// out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
