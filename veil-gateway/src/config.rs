//! Gateway configuration: where it listens and how it builds circuits.

use serde::Deserialize;
use veil_client::ClientConfig;

/// The TCP port the reference implementation's gateway listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 27182;

/// Configuration for one gateway instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Local TCP port to accept HTTP requests on.
    pub listen_port: u16,
    /// Directory/circuit-building configuration, shared with
    /// `veil-client`. A request's `count=N`/`order=random` query
    /// parameters override `circuit_len`/`relay_selection` per request.
    #[serde(flatten)]
    pub client: ClientConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen_port: DEFAULT_LISTEN_PORT,
            client: ClientConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// anything the file doesn't set.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_document_parses_to_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.client.circuit_len, veil_client::ClientConfig::default().circuit_len);
    }

    #[test]
    fn flattened_client_fields_parse_alongside_listen_port() {
        let toml = r#"
            listen_port = 8080
            directory_host = "10.0.0.1"
            circuit_len = 5
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.client.directory_host, "10.0.0.1");
        assert_eq!(config.client.circuit_len, 5);
    }
}
