//! Store connection configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `KVMIRROR_*` environment variables.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Key prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "mirai_bot:";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "KVMIRROR_";

/// Connection and namespacing settings for one process.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` of the store.
    pub address: String,
    /// Prepended to every logical collection name to form the store key.
    pub prefix: String,
    /// ACL user name sent with AUTH. Ignored without a password.
    pub username: Option<String>,
    /// Password sent with AUTH after connecting.
    pub password: Option<String>,
    /// Logical database selected after connecting.
    pub database: Option<i64>,
    /// How long to wait for the TCP connection to be established.
    pub connect_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".into(),
            prefix: DEFAULT_PREFIX.into(),
            username: None,
            password: None,
            database: None,
            connect_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults, overlaid by `path` if given, overlaid by the environment.
    pub fn load(path: Option<&Path>) -> StoreResult<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`, keyed by the full
    /// variable name (e.g. `KVMIRROR_ADDRESS`).
    pub fn with_env<F>(mut self, lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(address) = var("ADDRESS") {
            self.address = address;
        }
        if let Some(prefix) = var("PREFIX") {
            self.prefix = prefix;
        }
        if let Some(username) = var("USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = var("PASSWORD") {
            self.password = Some(password);
        }
        if let Some(database) = var("DATABASE") {
            let db = database.parse().map_err(|_| {
                StoreError::Config(format!("{ENV_PREFIX}DATABASE is not an integer: {database:?}"))
            })?;
            self.database = Some(db);
        }
        if let Some(timeout) = var("CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = timeout.parse().map_err(|_| {
                StoreError::Config(format!(
                    "{ENV_PREFIX}CONNECT_TIMEOUT_MS is not an integer: {timeout:?}"
                ))
            })?;
        }
        Ok(self)
    }

    /// Reject settings that cannot produce a working client.
    pub fn validate(&self) -> StoreResult<()> {
        if self.address.trim().is_empty() {
            return Err(StoreError::Config("address must not be empty".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StoreError::Config("connect_timeout_ms must be positive".into()));
        }
        if matches!(self.database, Some(db) if db < 0) {
            return Err(StoreError::Config("database index must not be negative".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("prefix", &self.prefix)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}
