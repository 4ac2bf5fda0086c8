//! Building a circuit hop by hop and making one request over it.
//!
//! Hop zero is a direct connection: the originator sends a raw RSA-OAEP
//! `ADD_CON` handshake, the same message every relay's own handshake
//! code expects from whatever connects to it. Every later hop is
//! reached by wrapping a `RELAY_CONNECT` instruction in one AES layer
//! per already-established hop and sending it down the existing
//! connection to the entry relay; each relay along the way forwards it
//! one hop further and relays the reply back, adding or peeling exactly
//! one layer as it goes.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use safelog::sensitive;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::info;
use veil_cell::{Cell, CellCodec, CellType, DirectoryEntry, HttpResponse};
use veil_crypto::{EcdheKeypair, SessionKey};

use crate::config::ClientConfig;
use crate::envelope::{unwrap_layers, wrap_layers};
use crate::err::{Error, Result};

fn timed_out(what: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::TimedOut, what)
}

fn closed(what: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, what)
}

/// A built circuit: a live connection to the entry relay and the
/// per-hop session keys needed to wrap requests and peel replies.
pub struct Circuit {
    session_keys: Vec<SessionKey>,
    stream: Framed<TcpStream, CellCodec>,
    relays: Vec<DirectoryEntry>,
    request_timeout_ms: u64,
}

impl Circuit {
    /// Connect to `relays[0]` directly and extend through the rest in
    /// order, deriving one session key per hop.
    pub async fn build(relays: Vec<DirectoryEntry>, config: &ClientConfig) -> Result<Self> {
        let Some(entry) = relays.first() else {
            return Err(Error::NotEnoughRelays { needed: 1, available: 0 });
        };

        let entry_addr = SocketAddr::new(IpAddr::V4(entry.ip_addr), entry.port);
        let mut stream = timeout(Duration::from_millis(config.connect_timeout_ms), TcpStream::connect(entry_addr))
            .await
            .map_err(|_| Error::Connect(timed_out("connect to entry relay timed out")))?
            .map_err(Error::Connect)?;

        let entry_pubkey = veil_crypto::rsa_public_from_pem(&entry.rsa_public_key_pem).map_err(Error::BadRelayKey)?;
        let keypair = EcdheKeypair::generate();
        let add_con = Cell::add_con(keypair.public_to_pem().map_err(Error::Crypto)?);
        let ciphertext =
            veil_crypto::rsa_encrypt(&entry_pubkey, &add_con.encode().map_err(Error::Encode)?).map_err(Error::Crypto)?;
        stream.write_all(&ciphertext).await?;

        let mut stream = Framed::new(stream, CellCodec);
        let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms);
        let resp = timeout(handshake_timeout, stream.next())
            .await
            .map_err(|_| Error::Connect(timed_out("entry relay handshake timed out")))?
            .ok_or_else(|| Error::Connect(closed("entry relay closed connection")))??;

        let k0 = derive_and_verify(&keypair, &entry_pubkey, resp)?;
        let mut session_keys = vec![k0];

        for hop in &relays[1..] {
            extend(&mut stream, &mut session_keys, hop, config).await?;
        }

        info!(hops = relays.len(), "circuit built");
        Ok(Circuit {
            session_keys,
            stream,
            relays,
            request_timeout_ms: config.request_timeout_ms,
        })
    }

    /// Fetch `url` over the circuit's exit hop, reassembling the
    /// streamed response.
    pub async fn request(&mut self, url: &str) -> Result<HttpResponse> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::BadUrl(url.to_string()));
        }

        let wrapped = wrap_layers(&self.session_keys, CellType::Req, &Cell::req(url))?;
        self.stream.send(wrapped).await?;

        let deadline = Duration::from_millis(self.request_timeout_ms);
        let response = timeout(deadline, self.read_response())
            .await
            .map_err(|_| Error::Connect(timed_out("request timed out")))?;

        match &response {
            Ok(resp) => info!(url = %sensitive(url), status = resp.status, "request served"),
            Err(e) => info!(url = %sensitive(url), error = %e, "request failed"),
        }
        response
    }

    async fn read_response(&mut self) -> Result<HttpResponse> {
        let mut buf = Vec::new();
        loop {
            let outer = self
                .stream
                .next()
                .await
                .ok_or_else(|| Error::Connect(closed("circuit closed mid-request")))??;
            let inner = unwrap_layers(&self.session_keys, &outer)?;
            match inner.cell_type {
                CellType::Continue => buf.extend_from_slice(&inner.payload),
                CellType::Finished => {
                    buf.extend_from_slice(&inner.payload);
                    break;
                }
                CellType::Failed => return Err(Error::RequestFailed),
                other => return Err(Error::UnexpectedCellType(other.name())),
            }
        }

        Ok(HttpResponse::decode(&buf)?)
    }

    /// Close the connection to the entry relay, tearing down every hop
    /// behind it as each relay notices its upstream socket has closed.
    pub async fn teardown(mut self) -> Result<()> {
        self.stream.close().await?;
        Ok(())
    }

    /// The relays this circuit runs through, entry hop first.
    pub fn relays(&self) -> &[DirectoryEntry] {
        &self.relays
    }
}

/// Extend the circuit one hop further, reusing the entry connection.
async fn extend(
    entry_stream: &mut Framed<TcpStream, CellCodec>,
    session_keys: &mut Vec<SessionKey>,
    hop: &DirectoryEntry,
    config: &ClientConfig,
) -> Result<()> {
    let hop_pubkey = veil_crypto::rsa_public_from_pem(&hop.rsa_public_key_pem).map_err(Error::BadRelayKey)?;
    let keypair = EcdheKeypair::generate();
    let add_con = Cell::add_con(keypair.public_to_pem().map_err(Error::Crypto)?);
    let ciphertext =
        veil_crypto::rsa_encrypt(&hop_pubkey, &add_con.encode().map_err(Error::Encode)?).map_err(Error::Crypto)?;

    let extend_cell = Cell::relay_connect(hop.ip_addr, hop.port, ciphertext);
    let wrapped = wrap_layers(session_keys, CellType::RelayConnect, &extend_cell)?;
    entry_stream.send(wrapped).await?;

    let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms);
    let outer = timeout(handshake_timeout, entry_stream.next())
        .await
        .map_err(|_| Error::Connect(timed_out("extend timed out")))?
        .ok_or_else(|| Error::Connect(closed("entry relay closed connection")))??;

    let inner = unwrap_layers(session_keys, &outer)?;
    match inner.cell_type {
        CellType::Failed => Err(Error::ExtendRefused),
        CellType::Finished => {
            let resp = Cell::decode(&inner.payload)?;
            let key = derive_and_verify(&keypair, &hop_pubkey, resp)?;
            session_keys.push(key);
            Ok(())
        }
        other => Err(Error::UnexpectedCellType(other.name())),
    }
}

/// Verify a `CONNECT_RESP` cell against a relay's advertised public key
/// and derive the session key it establishes.
fn derive_and_verify(
    keypair: &EcdheKeypair,
    relay_pubkey: &veil_crypto::RsaPublicKey,
    resp: Cell,
) -> Result<SessionKey> {
    resp.expect_type(CellType::ConnectResp)?;
    let salt = resp.salt.clone().ok_or(Error::UnexpectedCellType("CONNECT_RESP"))?;
    let signature = resp.signature.clone().ok_or(Error::UnexpectedCellType("CONNECT_RESP"))?;
    veil_crypto::rsa_verify(relay_pubkey, &signature, &salt).map_err(|_| Error::BadSignature)?;

    let peer_pem = String::from_utf8(resp.payload)
        .map_err(|_| Error::Cell(veil_cell::CellError::Truncated("CONNECT_RESP payload was not UTF-8".into())))?;
    keypair.derive(&peer_pem, &salt).map_err(Error::Crypto)
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use veil_cell::HttpResponse;
    use veil_crypto::{rsa_generate, RsaPrivateKey};

    fn derive_and_verify_ok(identity: &RsaPrivateKey) -> (EcdheKeypair, veil_crypto::RsaPublicKey, Cell) {
        let our_ecdhe = EcdheKeypair::generate();
        let relay_ecdhe = EcdheKeypair::generate();
        let relay_pubkey = veil_crypto::rsa_public_from_pem(
            &veil_crypto::rsa_public_to_pem(&identity.to_public_key()).unwrap(),
        )
        .unwrap();
        let salt = b"test-salt".to_vec();
        let signature = veil_crypto::rsa_sign(identity, &salt).unwrap();
        let resp = Cell::connect_resp(relay_ecdhe.public_to_pem().unwrap(), salt, signature);
        (our_ecdhe, relay_pubkey, resp)
    }

    #[test]
    fn derive_and_verify_accepts_valid_signature() {
        let identity = rsa_generate().unwrap();
        let (our_ecdhe, relay_pubkey, resp) = derive_and_verify_ok(&identity);
        assert!(derive_and_verify(&our_ecdhe, &relay_pubkey, resp).is_ok());
    }

    #[test]
    fn derive_and_verify_rejects_wrong_key_signature() {
        let identity = rsa_generate().unwrap();
        let impostor = rsa_generate().unwrap();
        let (our_ecdhe, _, resp) = derive_and_verify_ok(&impostor);
        let relay_pubkey =
            veil_crypto::rsa_public_from_pem(&veil_crypto::rsa_public_to_pem(&identity.to_public_key()).unwrap())
                .unwrap();
        assert!(matches!(
            derive_and_verify(&our_ecdhe, &relay_pubkey, resp),
            Err(Error::BadSignature)
        ));
    }

    #[test]
    fn derive_and_verify_rejects_wrong_cell_type() {
        let identity = rsa_generate().unwrap();
        let our_ecdhe = EcdheKeypair::generate();
        let relay_pubkey =
            veil_crypto::rsa_public_from_pem(&veil_crypto::rsa_public_to_pem(&identity.to_public_key()).unwrap())
                .unwrap();
        let not_a_resp = Cell::req("http://example/");
        assert!(derive_and_verify(&our_ecdhe, &relay_pubkey, not_a_resp).is_err());
    }

    /// Drive one end of a single-hop circuit against a hand-rolled task
    /// that plays the part of a relay: it runs the `ADD_CON` handshake,
    /// then answers a `REQ` with a `CONTINUE`/`FINISHED` chunk pair.
    #[tokio::test]
    async fn build_and_request_over_one_hop() {
        let identity = rsa_generate().unwrap();
        let pubkey_pem = veil_crypto::rsa_public_to_pem(&identity.to_public_key()).unwrap();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let relay_identity = identity.clone();
        let relay = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let rsa_len = relay_identity.size();

            let mut raw = vec![0u8; rsa_len];
            tokio::io::AsyncReadExt::read_exact(&mut stream, &mut raw).await.unwrap();
            let plaintext = veil_crypto::rsa_decrypt(&relay_identity, &raw).unwrap();
            let add_con = Cell::decode(&plaintext).unwrap();
            add_con.expect_type(CellType::AddCon).unwrap();
            let originator_pem = String::from_utf8(add_con.payload).unwrap();

            let our_ecdhe = EcdheKeypair::generate();
            let salt = b"integration-test-salt".to_vec();
            let signature = veil_crypto::rsa_sign(&relay_identity, &salt).unwrap();
            let session_key = our_ecdhe.derive(&originator_pem, &salt).unwrap();

            let mut framed = Framed::new(stream, CellCodec);
            framed
                .send(Cell::connect_resp(our_ecdhe.public_to_pem().unwrap(), salt, signature))
                .await
                .unwrap();

            let outer = framed.next().await.unwrap().unwrap();
            let inner = crate::envelope::unwrap(&session_key, &outer).unwrap();
            inner.expect_type(CellType::Req).unwrap();
            assert_eq!(inner.payload, b"http://example/page");

            let body = HttpResponse {
                status: 200,
                headers: vec![("content-type".into(), "text/plain".into())],
                body: b"hello from the exit".to_vec(),
            }
            .encode()
            .unwrap();
            let (head, tail) = body.split_at(5);
            framed
                .send(crate::envelope::wrap(&session_key, CellType::Continue, &Cell::continue_chunk(head.to_vec())).unwrap())
                .await
                .unwrap();
            framed
                .send(crate::envelope::wrap(&session_key, CellType::Finished, &Cell::finished(tail.to_vec())).unwrap())
                .await
                .unwrap();
        });

        let relays = vec![DirectoryEntry {
            ip_addr: match addr.ip() {
                IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            port: addr.port(),
            rsa_public_key_pem: pubkey_pem,
        }];
        let config = ClientConfig {
            circuit_len: 1,
            ..Default::default()
        };

        let mut circuit = Circuit::build(relays, &config).await.unwrap();
        assert_eq!(circuit.relays().len(), 1);

        let response = circuit.request("http://example/page").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello from the exit");

        circuit.teardown().await.unwrap();
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn request_rejects_unsupported_scheme() {
        let identity = rsa_generate().unwrap();
        let pubkey_pem = veil_crypto::rsa_public_to_pem(&identity.to_public_key()).unwrap();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let relay_identity = identity.clone();
        let relay = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let rsa_len = relay_identity.size();
            let mut raw = vec![0u8; rsa_len];
            tokio::io::AsyncReadExt::read_exact(&mut stream, &mut raw).await.unwrap();
            let plaintext = veil_crypto::rsa_decrypt(&relay_identity, &raw).unwrap();
            let add_con = Cell::decode(&plaintext).unwrap();
            let originator_pem = String::from_utf8(add_con.payload).unwrap();

            let our_ecdhe = EcdheKeypair::generate();
            let salt = b"scheme-test-salt".to_vec();
            let signature = veil_crypto::rsa_sign(&relay_identity, &salt).unwrap();
            let _session_key = our_ecdhe.derive(&originator_pem, &salt).unwrap();

            let mut framed = Framed::new(stream, CellCodec);
            framed
                .send(Cell::connect_resp(our_ecdhe.public_to_pem().unwrap(), salt, signature))
                .await
                .unwrap();
            // no request ever arrives; the originator rejects the URL locally
        });

        let relays = vec![DirectoryEntry {
            ip_addr: match addr.ip() {
                IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            port: addr.port(),
            rsa_public_key_pem: pubkey_pem,
        }];
        let config = ClientConfig {
            circuit_len: 1,
            ..Default::default()
        };

        let mut circuit = Circuit::build(relays, &config).await.unwrap();
        let err = circuit.request("ftp://example/").await.unwrap_err();
        assert!(matches!(err, Error::BadUrl(_)));

        circuit.teardown().await.unwrap();
        relay.abort();
    }
}
