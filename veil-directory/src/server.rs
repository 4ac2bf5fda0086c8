//! The directory's accept loop and per-connection protocol handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use safelog::sensitive;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{info, warn};
use veil_cell::{Cell, CellCodec, CellType};

use crate::config::DirectoryConfig;
use crate::err::{Error, Result};
use crate::registry::{RegisteredRelay, Registry};

/// Accept connections on `listener` forever, handling each on its own task.
///
/// Never returns under normal operation; a per-connection failure is
/// logged and only drops that connection, matching spec §7's "any
/// protocol error on a socket causes that socket's entry to be dropped;
/// other clients are unaffected."
pub async fn run(listener: TcpListener, registry: Arc<Registry>, config: Arc<DirectoryConfig>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "directory listening");
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, &registry, &config).await {
                warn!(peer = %sensitive(peer_addr), error = %e, "directory connection failed");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: &Registry,
    config: &DirectoryConfig,
) -> Result<()> {
    let mut framed = Framed::new(stream, CellCodec);
    let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms);

    let cell = timeout(handshake_timeout, framed.next())
        .await
        .map_err(|_| Error::NoCell)?
        .ok_or(Error::NoCell)??;

    match cell.cell_type {
        CellType::GiveDirect => handle_give_direct(cell, peer_addr, framed, registry).await,
        CellType::GetDirect => handle_get_direct(framed, registry, config).await,
        other => Err(Error::UnexpectedCellType(other.name())),
    }
}

async fn handle_give_direct(
    cell: Cell,
    peer_addr: SocketAddr,
    mut framed: Framed<TcpStream, CellCodec>,
    registry: &Registry,
) -> Result<()> {
    let key_pem = String::from_utf8_lossy(&cell.payload).into_owned();
    let port = cell.give_direct_port().ok_or(Error::UnexpectedCellType("GIVE_DIRECT"))?;
    let nonce = cell.salt.ok_or(Error::UnexpectedCellType("GIVE_DIRECT"))?;
    let signature = cell.signature.ok_or(Error::UnexpectedCellType("GIVE_DIRECT"))?;

    let pubkey = veil_crypto::rsa_public_from_pem(&key_pem).map_err(Error::BadPublicKey)?;
    veil_crypto::rsa_verify(&pubkey, &signature, &nonce).map_err(|_| Error::BadSignature)?;

    let ip_addr = match peer_addr.ip() {
        std::net::IpAddr::V4(v4) => v4,
        std::net::IpAddr::V6(v6) => v6.to_ipv4().unwrap_or(std::net::Ipv4Addr::UNSPECIFIED),
    };
    let relay = RegisteredRelay { ip_addr, port, key_pem };
    registry.register(relay.clone()).await;
    info!(peer = %sensitive(peer_addr), port, "relay registered");

    // Keep this task (and the registration socket) alive so the relay's
    // entry stays listed only as long as it stays connected; any error
    // reading from it (including a clean close) means it's gone.
    while framed.next().await.is_some() {}
    registry.remove(relay.ip_addr, relay.port).await;
    info!(peer = %sensitive(peer_addr), port, "relay deregistered");
    Ok(())
}

async fn handle_get_direct(
    mut framed: Framed<TcpStream, CellCodec>,
    registry: &Registry,
    config: &DirectoryConfig,
) -> Result<()> {
    let entries: Vec<veil_cell::DirectoryEntry> = registry
        .list()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    let payload = veil_cell::directory::encode_entries(&entries)?;
    framed.send(Cell::get_direct_reply(payload)).await?;

    // Give the client a short window to drain the reply before we close
    // regardless, matching the reference's ~30ms post-send settimeout.
    let drain_timeout = Duration::from_millis(config.drain_timeout_ms);
    let _ = timeout(drain_timeout, framed.next()).await;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use veil_crypto::rsa_generate;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (a, (b, _)) = tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (a.unwrap(), b)
    }

    #[tokio::test]
    async fn give_direct_then_get_direct_lists_the_relay() {
        let registry = Arc::new(Registry::default());
        let identity = rsa_generate().unwrap();
        let pubkey_pem = veil_crypto::rsa_public_to_pem(&veil_crypto::RsaPublicKey::from(&identity)).unwrap();

        let nonce = vec![7u8; 16];
        let signature = veil_crypto::rsa_sign(&identity, &nonce).unwrap();
        let give_direct = Cell::give_direct(pubkey_pem.clone(), 9001, nonce, signature);
        let peer_addr: SocketAddr = "203.0.113.5:4000".parse().unwrap();

        // handle_give_direct only returns once its connection closes, so
        // drive it on its own task and hold the client end open while we
        // query the listing, then close it to observe deregistration.
        let (mut client, server) = tcp_pair().await;
        let framed = Framed::new(server, CellCodec);
        let registration = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { handle_give_direct(give_direct, peer_addr, framed, &registry).await })
        };

        // Give the registration task a chance to run before querying.
        tokio::task::yield_now().await;
        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].port, 9001);
        assert_eq!(listed[0].ip_addr, std::net::Ipv4Addr::new(203, 0, 113, 5));

        tokio::io::AsyncWriteExt::shutdown(&mut client).await.unwrap();
        registration.await.unwrap().unwrap();
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn get_direct_returns_registered_entries() {
        let registry = Registry::default();
        registry
            .register(RegisteredRelay {
                ip_addr: std::net::Ipv4Addr::new(198, 51, 100, 7),
                port: 9001,
                key_pem: "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----".into(),
            })
            .await;
        let registry = Arc::new(registry);
        let config = DirectoryConfig::default();

        let (client, server) = tcp_pair().await;
        let mut client = Framed::new(client, CellCodec);
        let server_framed = Framed::new(server, CellCodec);

        let registry_for_task = Arc::clone(&registry);
        let task = tokio::spawn(async move { handle_get_direct(server_framed, &registry_for_task, &config).await });

        let reply = client.next().await.unwrap().unwrap();
        reply.expect_type(CellType::GetDirect).unwrap();
        let entries = veil_cell::directory::decode_entries(&reply.payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].port, 9001);

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn handle_connection_rejects_unexpected_first_cell() {
        let registry = Arc::new(Registry::default());
        let config = Arc::new(DirectoryConfig::default());

        let (client, server) = tcp_pair().await;
        let mut client = Framed::new(client, CellCodec);

        let task = tokio::spawn({
            let registry = Arc::clone(&registry);
            let config = Arc::clone(&config);
            async move { handle_connection(server, "127.0.0.1:1".parse().unwrap(), &registry, &config).await }
        });

        client.send(Cell::req("http://example/")).await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::UnexpectedCellType(_))));
    }
}
