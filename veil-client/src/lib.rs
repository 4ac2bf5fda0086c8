//! Building circuits through a veil overlay and making requests over them.
//!
//! The typical caller (the gateway binary) wants none of the per-hop
//! detail: [`fetch`] queries the directory, picks relays, builds a
//! circuit, makes one request, and tears the circuit back down.
//! Longer-lived callers that want to reuse a circuit for several
//! requests can drive [`Circuit`] directly.

pub mod circuit;
pub mod config;
pub mod directory_client;
pub mod envelope;
pub mod err;

pub use circuit::Circuit;
pub use config::{ClientConfig, RelaySelection};
pub use err::{Error, Result};
pub use veil_cell::HttpResponse;

/// Query the directory, build a circuit through `config.circuit_len`
/// relays, fetch `url` over it, and tear the circuit down.
pub async fn fetch(config: &ClientConfig, url: &str) -> Result<HttpResponse> {
    let entries = directory_client::query(config).await?;
    let relays = directory_client::select_relays(&entries, config)?;
    let mut circuit = Circuit::build(relays, config).await?;
    let result = circuit.request(url).await;
    let _ = circuit.teardown().await;
    result
}
