//! Directory configuration record.
//!
//! Replaces the reference implementation's module-level constant (a
//! hardcoded `50000`) with an explicit record loaded from a TOML file and
//! overridable from the CLI, per Design Note §9.

use serde::Deserialize;

/// The TCP port the reference implementation hardcodes the directory to.
pub const DEFAULT_LISTEN_PORT: u16 = 50000;

/// Configuration for one directory service instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// TCP port to listen on for `GIVE_DIRECT`/`GET_DIRECT` connections.
    pub listen_port: u16,
    /// How long a registration's first cell may take to arrive before the
    /// connection is dropped.
    pub handshake_timeout_ms: u64,
    /// How long the directory waits for a `GET_DIRECT` client to drain its
    /// reply before closing the connection regardless.
    pub drain_timeout_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig {
            listen_port: DEFAULT_LISTEN_PORT,
            handshake_timeout_ms: 300,
            drain_timeout_ms: 30,
        }
    }
}

impl DirectoryConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// anything the file doesn't set.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
