//! Command-line surface for the `veil-relay` binary.

use std::path::PathBuf;

use clap::Parser;

/// Run a veil relay: terminate one hop of a circuit, relaying traffic
/// deeper or, as an exit, contacting the destination web server.
#[derive(Debug, Parser)]
#[command(name = "veil-relay", version)]
pub struct Cli {
    /// Path to a TOML configuration file. If omitted, built-in defaults
    /// are used (and may still be overridden by the flags below).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(short, long)]
    pub listen_port: Option<u16>,

    /// Override the identity string used to name this relay's key file.
    #[arg(long)]
    pub relay_id: Option<String>,

    /// Override the directory of this relay's identity key file.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Skip `fs-mistrust` permission checks on the key store.
    #[arg(long)]
    pub disable_fs_permission_checks: bool,

    /// Tracing filter directive (e.g. `debug`, `veil_relay=trace`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
