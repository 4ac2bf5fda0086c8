//! Querying the directory service for candidate relays, and choosing
//! which ones to chain into a circuit.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use veil_cell::{Cell, CellCodec, CellType, DirectoryEntry};

use crate::config::{ClientConfig, RelaySelection};
use crate::err::{Error, Result};

/// Query the directory named in `config` for its full relay listing.
pub async fn query(config: &ClientConfig) -> Result<Vec<DirectoryEntry>> {
    let addr = (config.directory_host.as_str(), config.directory_port);
    let stream = timeout(Duration::from_millis(config.directory_timeout_ms), TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Directory(std::io::Error::new(std::io::ErrorKind::TimedOut, "directory connect timed out")))?
        .map_err(Error::Directory)?;

    let mut framed = Framed::new(stream, CellCodec);
    framed.send(Cell::get_direct_query()).await?;

    let reply = timeout(Duration::from_millis(config.directory_timeout_ms), framed.next())
        .await
        .map_err(|_| Error::Directory(std::io::Error::new(std::io::ErrorKind::TimedOut, "directory reply timed out")))?
        .ok_or_else(|| Error::Directory(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "directory closed connection")))??;

    reply.expect_type(CellType::GetDirect)?;
    Ok(veil_cell::directory::decode_entries(&reply.payload)?)
}

/// Choose `config.circuit_len` relays from `entries` per `config.relay_selection`.
pub fn select_relays(entries: &[DirectoryEntry], config: &ClientConfig) -> Result<Vec<DirectoryEntry>> {
    if entries.len() < config.circuit_len {
        return Err(Error::NotEnoughRelays {
            needed: config.circuit_len,
            available: entries.len(),
        });
    }
    match config.relay_selection {
        RelaySelection::InOrder => Ok(entries[..config.circuit_len].to_vec()),
        RelaySelection::Random => {
            let mut chosen: Vec<DirectoryEntry> = entries.to_vec();
            chosen.shuffle(&mut rand::thread_rng());
            chosen.truncate(config.circuit_len);
            Ok(chosen)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn entry(port: u16) -> DirectoryEntry {
        DirectoryEntry {
            ip_addr: Ipv4Addr::new(127, 0, 0, 1),
            port,
            rsa_public_key_pem: "pem".into(),
        }
    }

    #[test]
    fn selects_in_order_by_default() {
        let entries = vec![entry(1), entry(2), entry(3), entry(4)];
        let config = ClientConfig { circuit_len: 2, ..Default::default() };
        let chosen = select_relays(&entries, &config).unwrap();
        assert_eq!(chosen.iter().map(|e| e.port).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn rejects_when_directory_too_small() {
        let entries = vec![entry(1)];
        let config = ClientConfig { circuit_len: 3, ..Default::default() };
        assert!(matches!(
            select_relays(&entries, &config),
            Err(Error::NotEnoughRelays { needed: 3, available: 1 })
        ));
    }
}
