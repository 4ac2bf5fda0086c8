//! Per-connection protocol handling for one upstream client: the
//! originator, or another relay extending a circuit through this one.
//!
//! Each connection gets its own `tokio` task and its own local
//! [`ClientState`] — nothing about servicing one client ever needs to
//! look at another's state, so there is no shared table to lock.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::RngCore;
use safelog::sensitive;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use veil_cell::{Cell, CellCodec, CellType};
use veil_crypto::{EcdheKeypair, RsaPrivateKey, SessionKey};
use veil_error::HasKind;

use crate::config::{RelayConfig, CHUNK_BYTES};
use crate::err::{Error, Result};
use crate::wrap::{unwrap, wrap};

/// User agent the exit hop presents to destination servers, matching the
/// reference implementation's value so responses aren't skewed by an
/// obviously-automated client identifying itself.
const EXIT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.77 Safari/537.36";

/// Length of the random salt this relay contributes to the ECDHE
/// handshake and signs as proof of identity.
const HANDSHAKE_SALT_LEN: usize = 16;

/// What this relay knows about one client connection.
///
/// There is no separate `Established`/`Extended` flag: `bounce` being
/// `Some` *is* the Extended state (spec: "a relay without `bounce_socket`
/// silently drops RELAY cells").
struct ClientState {
    session_key: SessionKey,
    bounce: Option<Framed<TcpStream, CellCodec>>,
}

/// Handle one accepted connection end to end: the `ADD_CON` handshake,
/// then the RELAY_CONNECT/RELAY/REQ dispatch loop until the peer
/// disconnects or sends something this relay rejects.
pub async fn handle_client(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    identity: Arc<RsaPrivateKey>,
    config: Arc<RelayConfig>,
) -> Result<()> {
    let rsa_len = identity.size();
    let mut raw = vec![0u8; rsa_len];
    timeout(
        Duration::from_millis(config.handshake_timeout_ms),
        stream.read_exact(&mut raw),
    )
    .await
    .map_err(|_| Error::HandshakeTimeout)??;

    let plaintext = veil_crypto::rsa_decrypt(&identity, &raw).map_err(Error::BadHandshake)?;
    let add_con = Cell::decode(&plaintext)?;
    add_con.expect_type(CellType::AddCon)?;
    let peer_ecdhe_pem = String::from_utf8(add_con.payload)
        .map_err(|_| Error::MalformedCell(veil_cell::CellError::Truncated("ADD_CON payload was not UTF-8".into())))?;

    let our_ecdhe = EcdheKeypair::generate();
    let mut salt = vec![0u8; HANDSHAKE_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let signature = veil_crypto::rsa_sign(&identity, &salt).map_err(Error::Sign)?;
    let session_key = our_ecdhe.derive(&peer_ecdhe_pem, &salt).map_err(Error::KeyAgreement)?;
    let our_ecdhe_pem = our_ecdhe.public_to_pem().map_err(Error::KeyAgreement)?;

    let mut framed = Framed::new(stream, CellCodec);
    framed.send(Cell::connect_resp(our_ecdhe_pem, salt, signature)).await?;
    info!(peer = %sensitive(peer_addr), "client handshake complete");

    let mut state = ClientState {
        session_key,
        bounce: None,
    };

    while let Some(item) = framed.next().await {
        let outer = item?;
        let inner = match unwrap(&state.session_key, &outer) {
            Ok(inner) => inner,
            Err(e) => {
                warn!(peer = %sensitive(peer_addr), error = %e, "rejecting malformed envelope");
                return Err(e);
            }
        };

        match inner.cell_type {
            CellType::RelayConnect => handle_extend(&mut framed, &mut state, inner, &config, peer_addr).await?,
            CellType::Relay => handle_relay(&mut framed, &mut state, inner, peer_addr).await?,
            CellType::Req => handle_req(&mut framed, &state, inner, &config, peer_addr).await?,
            other => return Err(Error::UnexpectedCellType(other.name())),
        }
    }

    if let Some(mut bounce) = state.bounce.take() {
        let _ = bounce.close().await;
    }
    info!(peer = %sensitive(peer_addr), "client disconnected");
    Ok(())
}

/// Extend the circuit one hop further: connect downstream, forward the
/// handshake blob verbatim, and relay the result back wrapped under this
/// client's session key.
async fn handle_extend(
    framed: &mut Framed<TcpStream, CellCodec>,
    state: &mut ClientState,
    inner: Cell,
    config: &RelayConfig,
    peer_addr: SocketAddr,
) -> Result<()> {
    let (ip, port) = inner.addr.ok_or(Error::UnexpectedCellType("RELAY_CONNECT"))?;
    let next_hop = SocketAddr::new(IpAddr::V4(ip), port);
    let downstream_timeout = Duration::from_millis(config.downstream_timeout_ms);

    let mut downstream = match timeout(downstream_timeout, TcpStream::connect(next_hop)).await {
        Ok(Ok(stream)) => stream,
        _ => {
            let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed("CONNECTIONREFUSED"))?;
            framed.send(failure).await?;
            warn!(peer = %sensitive(peer_addr), next_hop = %next_hop, "extend failed to connect downstream");
            return Ok(());
        }
    };

    if let Err(e) = tokio::io::AsyncWriteExt::write_all(&mut downstream, &inner.payload).await {
        let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed("CONNECTIONREFUSED"))?;
        framed.send(failure).await?;
        warn!(peer = %sensitive(peer_addr), error = %e, "extend failed to forward handshake");
        return Ok(());
    }

    let mut bounce = Framed::new(downstream, CellCodec);
    let downstream_cell = match timeout(downstream_timeout, bounce.next()).await {
        Ok(Some(Ok(cell))) => cell,
        _ => {
            let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed(""))?;
            framed.send(failure).await?;
            warn!(peer = %sensitive(peer_addr), next_hop = %next_hop, "extend got no reply from downstream");
            return Ok(());
        }
    };

    // The full downstream CONNECT_RESP travels upstream unmodified (salt
    // and signature included) so the originator can verify it and derive
    // the next hop's session key itself; only the envelope around it is
    // this relay's own.
    let finished = wrap(&state.session_key, CellType::Finished, &downstream_cell)?;
    framed.send(finished).await?;

    state.bounce = Some(bounce);
    info!(peer = %sensitive(peer_addr), next_hop = %next_hop, "circuit extended");
    Ok(())
}

/// Forward an opaque cell to the already-extended downstream hop, then
/// relay its reply stream back, re-wrapped under this client's session
/// key, until a `FINISHED` or `FAILED` frame ends the exchange.
async fn handle_relay(
    framed: &mut Framed<TcpStream, CellCodec>,
    state: &mut ClientState,
    inner: Cell,
    peer_addr: SocketAddr,
) -> Result<()> {
    let Some(bounce) = state.bounce.as_mut() else {
        debug!(peer = %sensitive(peer_addr), "dropping RELAY cell: no downstream connection");
        return Ok(());
    };

    let forward = Cell::decode(&inner.payload)?;
    bounce.send(forward).await?;

    loop {
        let reply = match bounce.next().await {
            Some(item) => item?,
            None => {
                let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed(""))?;
                framed.send(failure).await?;
                state.bounce = None;
                warn!(peer = %sensitive(peer_addr), "downstream connection closed mid-relay");
                return Ok(());
            }
        };

        let terminal = matches!(reply.cell_type, CellType::Finished | CellType::Failed);
        let outer_type = reply.cell_type;
        let wrapped = wrap(&state.session_key, outer_type, &reply)?;
        framed.send(wrapped).await?;

        if terminal {
            return Ok(());
        }
    }
}

/// Serve an exit request: fetch the URL over plain HTTP(S) and stream the
/// response back as `CONTINUE` chunks terminated by one `FINISHED` chunk.
async fn handle_req(
    framed: &mut Framed<TcpStream, CellCodec>,
    state: &ClientState,
    inner: Cell,
    config: &RelayConfig,
    peer_addr: SocketAddr,
) -> Result<()> {
    let url = match String::from_utf8(inner.payload) {
        Ok(url) => url,
        Err(_) => {
            let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed("ERROR"))?;
            framed.send(failure).await?;
            return Ok(());
        }
    };

    let http_client = reqwest::Client::builder()
        .user_agent(EXIT_USER_AGENT)
        .timeout(Duration::from_millis(config.exit_request_timeout_ms))
        .build()
        .expect("static reqwest client configuration is always valid");

    let (status, headers, body) = match http_client.get(&url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
                .collect::<Vec<_>>();
            match response.bytes().await {
                Ok(bytes) => (status, headers, bytes.to_vec()),
                Err(e) => {
                    let e = Error::Exit(e);
                    warn!(peer = %sensitive(peer_addr), url = %sensitive(&url), error = %e, kind = ?e.kind(), "exit response body read failed");
                    let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed("ERROR"))?;
                    framed.send(failure).await?;
                    return Ok(());
                }
            }
        }
        Err(e) => {
            let e = Error::Exit(e);
            warn!(peer = %sensitive(peer_addr), url = %sensitive(&url), error = %e, kind = ?e.kind(), "exit request failed");
            let failure = wrap(&state.session_key, CellType::Failed, &Cell::failed("ERROR"))?;
            framed.send(failure).await?;
            return Ok(());
        }
    };

    let encoded = veil_cell::HttpResponse { status, headers, body }.encode()?;
    let chunks: Vec<&[u8]> = if encoded.is_empty() {
        vec![&[]]
    } else {
        encoded.chunks(CHUNK_BYTES).collect()
    };
    let last = chunks.len() - 1;

    for (i, chunk) in chunks.into_iter().enumerate() {
        let (outer_type, inner_cell) = if i == last {
            (CellType::Finished, Cell::finished(chunk.to_vec()))
        } else {
            (CellType::Continue, Cell::continue_chunk(chunk.to_vec()))
        };
        let wrapped = wrap(&state.session_key, outer_type, &inner_cell)?;
        framed.send(wrapped).await?;
    }

    info!(peer = %sensitive(peer_addr), url = %sensitive(&url), status, "exit request served");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;
    use veil_crypto::{rsa_generate, EcdheKeypair};

    async fn framed_pair() -> (Framed<TcpStream, CellCodec>, Framed<TcpStream, CellCodec>) {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (a, (b, _)) = tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (Framed::new(a.unwrap(), CellCodec), Framed::new(b, CellCodec))
    }

    fn test_session_key() -> SessionKey {
        let a = EcdheKeypair::generate();
        let b = EcdheKeypair::generate();
        a.derive(&b.public_to_pem().unwrap(), b"client-test-salt").unwrap()
    }

    #[tokio::test]
    async fn handle_relay_without_bounce_drops_silently() {
        let (mut ours, mut theirs) = framed_pair().await;
        let session_key = test_session_key();
        let mut state = ClientState {
            session_key: session_key.clone(),
            bounce: None,
        };
        let inner = wrap(&session_key, CellType::Relay, &Cell::relay(vec![1, 2, 3])).unwrap();
        let inner = unwrap(&session_key, &inner).unwrap();

        handle_relay(&mut ours, &mut state, inner, "127.0.0.1:1".parse().unwrap())
            .await
            .unwrap();

        // Nothing should have been sent back: a short read must time out.
        let result = tokio::time::timeout(Duration::from_millis(100), theirs.next()).await;
        assert!(result.is_err(), "expected no reply, got {result:?}");
    }

    #[tokio::test]
    async fn handle_extend_reports_connection_refused() {
        let (mut ours, mut theirs) = framed_pair().await;
        let session_key = test_session_key();
        let mut state = ClientState {
            session_key: session_key.clone(),
            bounce: None,
        };

        // Bind then immediately drop a listener to get a port nothing is
        // listening on.
        let refused_port = {
            let l = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
            l.local_addr().unwrap().port()
        };
        let config = RelayConfig {
            downstream_timeout_ms: 500,
            ..Default::default()
        };
        let inner = Cell::relay_connect(Ipv4Addr::LOCALHOST, refused_port, vec![9, 9, 9]);

        handle_extend(&mut ours, &mut state, inner, &config, "127.0.0.1:1".parse().unwrap())
            .await
            .unwrap();
        assert!(state.bounce.is_none());

        let reply = theirs.next().await.unwrap().unwrap();
        let unwrapped = unwrap(&session_key, &reply).unwrap();
        unwrapped.expect_type(CellType::Failed).unwrap();
        assert_eq!(unwrapped.payload, b"CONNECTIONREFUSED");
    }

    #[tokio::test]
    async fn handle_client_completes_add_con_handshake() {
        let identity = rsa_generate().unwrap();
        let pubkey_pem = veil_crypto::rsa_public_to_pem(&veil_crypto::RsaPublicKey::from(&identity)).unwrap();
        let identity = Arc::new(identity);
        let config = Arc::new(RelayConfig::default());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_identity = Arc::clone(&identity);
        let server_config = Arc::clone(&config);
        let server = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.unwrap();
            // A closed socket after the handshake ends the loop with Ok(()).
            let _ = handle_client(stream, peer_addr, server_identity, server_config).await;
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let relay_pubkey = veil_crypto::rsa_public_from_pem(&pubkey_pem).unwrap();
        let our_ecdhe = EcdheKeypair::generate();
        let add_con = Cell::add_con(our_ecdhe.public_to_pem().unwrap());
        let ciphertext = veil_crypto::rsa_encrypt(&relay_pubkey, &add_con.encode().unwrap()).unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stream, &ciphertext).await.unwrap();

        let mut framed = Framed::new(stream, CellCodec);
        let resp = framed.next().await.unwrap().unwrap();
        resp.expect_type(CellType::ConnectResp).unwrap();
        let salt = resp.salt.clone().unwrap();
        let signature = resp.signature.clone().unwrap();
        veil_crypto::rsa_verify(&relay_pubkey, &signature, &salt).unwrap();

        framed.close().await.unwrap();
        server.await.unwrap();
    }
}
