//! The relay's accept loop: one task per client connection.

use std::sync::Arc;

use safelog::sensitive;
use tokio::net::TcpListener;
use tracing::{info, warn};
use veil_crypto::RsaPrivateKey;

use crate::client;
use crate::config::RelayConfig;

/// Accept connections on `listener` forever, handling each on its own
/// task. A per-connection failure is logged and only drops that
/// connection; every other client keeps being served.
pub async fn run(listener: TcpListener, identity: Arc<RsaPrivateKey>, config: Arc<RelayConfig>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "relay listening");
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let identity = Arc::clone(&identity);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = client::handle_client(stream, peer_addr, identity, config).await {
                warn!(peer = %sensitive(peer_addr), error = %e, "client connection failed");
            }
        });
    }
}
