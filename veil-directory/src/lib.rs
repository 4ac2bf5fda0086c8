//! The veil directory service: a single-process registry of live relays.
//!
//! Relays register themselves with a `GIVE_DIRECT` cell carrying a
//! proof-of-possession signature over a random nonce; clients list the
//! current registry with a `GET_DIRECT` cell. See spec §4.3.

pub mod cli;
pub mod config;
pub mod err;
pub mod registry;
pub mod server;

pub use config::DirectoryConfig;
pub use err::{Error, Result};
pub use registry::{RegisteredRelay, Registry};
