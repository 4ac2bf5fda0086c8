//! Relay configuration record.
//!
//! Replaces the reference implementation's global module-level debug
//! flags and hardcoded directory address with an explicit record loaded
//! from a TOML file and overridable from the CLI, per Design Note §9.

use std::path::PathBuf;

use serde::Deserialize;

/// The TCP port the reference implementation's directory listens on.
pub const DEFAULT_DIRECTORY_PORT: u16 = 50000;

/// Maximum size, in bytes, of one chunk of a streamed exit response
/// (reference value `BASE_PACKET_SIZE`).
pub const CHUNK_BYTES: usize = 4096;

/// Configuration for one relay instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// TCP port this relay listens on for upstream connections.
    pub listen_port: u16,
    /// Directory host to register with and advertise a listening address on.
    pub directory_host: String,
    /// Directory port to register with.
    pub directory_port: u16,
    /// Directory entry this relay advertises for itself; defaults to
    /// "the address the OS picks for our outbound directory connection".
    pub advertise_host: Option<String>,
    /// Directory where this relay's identity key is stored, and the
    /// identity string used to name the key file.
    pub state_dir: PathBuf,
    /// Identity string used to name this relay's key file
    /// (`<state_dir>/relay_<relay_id>.pem`).
    pub relay_id: String,
    /// How long a new connection's handshake frame may take to arrive.
    pub handshake_timeout_ms: u64,
    /// How long an extend's downstream connect/first-reply may take.
    pub downstream_timeout_ms: u64,
    /// Timeout for the exit relay's outbound HTTP GET.
    pub exit_request_timeout_ms: u64,
    /// Whether to skip `fs-mistrust` permission checks on the key store
    /// (development convenience; never set in production).
    pub disable_fs_permission_checks: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            listen_port: 45000,
            directory_host: "127.0.0.1".into(),
            directory_port: DEFAULT_DIRECTORY_PORT,
            advertise_host: None,
            state_dir: PathBuf::from("."),
            relay_id: "0".into(),
            handshake_timeout_ms: 300,
            downstream_timeout_ms: 2_000,
            exit_request_timeout_ms: 10_000,
            disable_fs_permission_checks: false,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// anything the file doesn't set.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
