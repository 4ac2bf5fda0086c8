//! Originator configuration: which directory to consult, how long a
//! circuit should be, and the timeouts governing each network step.

use serde::Deserialize;

/// The TCP port the reference implementation's directory listens on.
pub const DEFAULT_DIRECTORY_PORT: u16 = 50000;

/// Number of relays a freshly built circuit uses by default.
pub const DEFAULT_CIRCUIT_LEN: usize = 3;

/// How a circuit's relays are selected from the directory's full listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaySelection {
    /// Take the directory's first `circuit_len` entries, in listing order.
    InOrder,
    /// Choose `circuit_len` entries uniformly at random without replacement.
    Random,
}

/// Configuration for building circuits and making requests over them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Directory host to query for candidate relays.
    pub directory_host: String,
    /// Directory port to query.
    pub directory_port: u16,
    /// Number of relays to chain together per circuit.
    pub circuit_len: usize,
    /// How relays are chosen from the directory's listing.
    pub relay_selection: RelaySelection,
    /// How long a directory query may take before failing.
    pub directory_timeout_ms: u64,
    /// How long connecting to a hop may take.
    pub connect_timeout_ms: u64,
    /// How long one hop's handshake reply may take.
    pub handshake_timeout_ms: u64,
    /// How long a full request/response exchange may take once the
    /// circuit is built.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            directory_host: "127.0.0.1".into(),
            directory_port: DEFAULT_DIRECTORY_PORT,
            circuit_len: DEFAULT_CIRCUIT_LEN,
            relay_selection: RelaySelection::InOrder,
            directory_timeout_ms: 2_000,
            connect_timeout_ms: 2_000,
            handshake_timeout_ms: 2_000,
            request_timeout_ms: 15_000,
        }
    }
}
