//! The veil gateway: an HTTP front door onto the overlay.
//!
//! Serves `GET /?url=<url>[&count=N][&order=random]` by building a
//! circuit through the directory's current relays and making one
//! request over it, returning the upstream status and body (or HTTP
//! 404 on any failure, per spec §7). See spec §4.6.

pub mod cli;
pub mod config;
pub mod err;
pub mod server;

pub use config::GatewayConfig;
pub use err::{Error, Result};
