//! The directory's registry of live relays.
//!
//! Spec calls for `registered`, an ordered sequence of public entries,
//! plus a parallel `connected` mapping to each entry's live registration
//! socket used only to detect liveness. Here every registration is its
//! own `tokio` task that owns that liveness detection directly (it holds
//! the socket and removes its own entry when the socket closes), so the
//! registry itself only needs to be the ordered sequence.

use std::net::Ipv4Addr;

use tokio::sync::Mutex;
use veil_cell::DirectoryEntry;

/// One relay that has proven possession of the RSA key it registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredRelay {
    /// The relay's address, taken from its TCP source address.
    pub ip_addr: Ipv4Addr,
    /// The relay's advertised listening port.
    pub port: u16,
    /// The relay's long-term RSA public key, PEM-encoded.
    pub key_pem: String,
}

impl From<RegisteredRelay> for DirectoryEntry {
    fn from(r: RegisteredRelay) -> Self {
        DirectoryEntry {
            ip_addr: r.ip_addr,
            port: r.port,
            rsa_public_key_pem: r.key_pem,
        }
    }
}

/// The shared registry of registered relays.
///
/// The only cross-task state the directory has; every update goes
/// through this mutex, matching spec §5's "no locking required under
/// single-threaded discipline" promoted to "serialize the one piece of
/// shared state" for a per-connection-task design (spec §5's explicit
/// license for reimplementations with first-class concurrency).
#[derive(Default)]
pub struct Registry {
    entries: Mutex<Vec<RegisteredRelay>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register `relay`, or do nothing if an identical (ip, port, key)
    /// entry already exists. An entry with the same (ip, port) but a
    /// different key is replaced, since that can only mean the relay
    /// restarted with a fresh identity between the old entry's removal
    /// and this registration being processed.
    pub async fn register(&self, relay: RegisteredRelay) {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| *e == relay) {
            return;
        }
        entries.retain(|e| !(e.ip_addr == relay.ip_addr && e.port == relay.port));
        entries.push(relay);
    }

    /// Remove the entry for `(ip_addr, port)`, if any.
    pub async fn remove(&self, ip_addr: Ipv4Addr, port: u16) {
        let mut entries = self.entries.lock().await;
        entries.retain(|e| !(e.ip_addr == ip_addr && e.port == port));
    }

    /// Return a snapshot of every currently registered relay, in
    /// registration order.
    pub async fn list(&self) -> Vec<RegisteredRelay> {
        self.entries.lock().await.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn relay(port: u16, key: &str) -> RegisteredRelay {
        RegisteredRelay {
            ip_addr: Ipv4Addr::new(127, 0, 0, 1),
            port,
            key_pem: key.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_idempotent() {
        let reg = Registry::new();
        reg.register(relay(9001, "key-a")).await;
        reg.register(relay(9001, "key-a")).await;
        assert_eq!(reg.list().await.len(), 1);
    }

    #[tokio::test]
    async fn reregistration_with_new_key_replaces_entry() {
        let reg = Registry::new();
        reg.register(relay(9001, "key-a")).await;
        reg.register(relay(9001, "key-b")).await;
        let entries = reg.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key_pem, "key-b");
    }

    #[tokio::test]
    async fn remove_drops_only_the_matching_entry() {
        let reg = Registry::new();
        reg.register(relay(9001, "key-a")).await;
        reg.register(relay(9002, "key-b")).await;
        reg.remove(Ipv4Addr::new(127, 0, 0, 1), 9001).await;
        let entries = reg.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].port, 9002);
    }
}
