//! Self-registration with the directory service.
//!
//! A relay proves possession of its identity key the same way the
//! directory's own `handle_give_direct` expects (see
//! `veil-directory/src/server.rs`): a `GIVE_DIRECT` cell carrying its
//! public key, advertised port, a fresh nonce, and an RSA-PSS signature
//! over that nonce. The registration socket is then held open for the
//! life of the process; the directory treats its close as deregistration.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::RngCore;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use veil_cell::{Cell, CellCodec};
use veil_crypto::RsaPrivateKey;

use crate::config::RelayConfig;
use crate::err::{Error, Result};

/// Length of the random nonce signed during registration, matching the
/// reference implementation's 128-byte proof-of-possession blob.
const NONCE_LEN: usize = 128;

/// How long to wait before retrying a failed registration attempt.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Register with the directory named in `config`, retrying forever on
/// failure and holding the connection open on success.
///
/// This never returns: either a registration attempt succeeds and the
/// task blocks reading (and discarding) whatever the directory sends
/// back, or it fails and the task waits [`RETRY_DELAY`] before retrying.
/// A directory restart therefore re-registers this relay automatically
/// the next time this loop notices the socket has closed.
pub async fn run(identity: Arc<RsaPrivateKey>, config: Arc<RelayConfig>) {
    loop {
        match register_once(&identity, &config).await {
            Ok(()) => warn!("directory registration connection closed, re-registering"),
            Err(e) => warn!(error = %e, "directory registration failed, retrying"),
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

async fn register_once(identity: &RsaPrivateKey, config: &RelayConfig) -> Result<()> {
    let addr = (config.directory_host.as_str(), config.directory_port);
    let stream = TcpStream::connect(addr).await?;
    let mut framed = Framed::new(stream, CellCodec);

    let pubkey = veil_crypto::RsaPublicKey::from(identity);
    let pubkey_pem = veil_crypto::rsa_public_to_pem(&pubkey).map_err(Error::Sign)?;

    let mut nonce = vec![0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let signature = veil_crypto::rsa_sign(identity, &nonce).map_err(Error::Sign)?;

    let cell = Cell::give_direct(pubkey_pem, config.listen_port, nonce, signature);
    framed.send(cell).await?;
    info!(
        directory = %config.directory_host,
        port = config.directory_port,
        "registered with directory"
    );

    // Hold the socket open; its close is this relay's deregistration.
    while framed.next().await.is_some() {}
    Ok(())
}
