//! Command-line surface for the `veil-directory` binary.

use std::path::PathBuf;

use clap::Parser;

/// Run the veil directory service: a registry of live relays that
/// relays register with and clients query for candidate circuit hops.
#[derive(Debug, Parser)]
#[command(name = "veil-directory", version)]
pub struct Cli {
    /// Path to a TOML configuration file. If omitted, built-in defaults
    /// are used (and may still be overridden by the flags below).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(short, long)]
    pub listen_port: Option<u16>,

    /// Tracing filter directive (e.g. `debug`, `veil_directory=trace`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
