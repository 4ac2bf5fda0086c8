//! Persistent storage for a relay's long-term identity key.
//!
//! A relay's identity is a single 3072-bit RSA keypair loaded from a PEM
//! file at startup; this crate owns the conventional naming of that file
//! and the `fs-mistrust` permissions check that gates reading or writing
//! it.

mod err;
mod keystore;

pub use err::{Error, Result};
pub use keystore::{load_or_generate_relay_key, relay_key_path};
