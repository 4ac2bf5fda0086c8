//! Command-line surface for the `veil-gateway` binary.

use std::path::PathBuf;

use clap::Parser;

/// Run the veil gateway: an HTTP front door that serves `GET` requests
/// over circuits built through the overlay.
#[derive(Debug, Parser)]
#[command(name = "veil-gateway", version)]
pub struct Cli {
    /// Path to a TOML configuration file. If omitted, built-in defaults
    /// are used (and may still be overridden by the flags below).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(short, long)]
    pub listen_port: Option<u16>,

    /// Override the directory host to query for candidate relays.
    #[arg(long)]
    pub directory_host: Option<String>,

    /// Override the directory port to query.
    #[arg(long)]
    pub directory_port: Option<u16>,

    /// Tracing filter directive (e.g. `debug`, `veil_gateway=trace`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
