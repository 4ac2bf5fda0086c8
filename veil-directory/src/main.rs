//! The veil directory service binary.

use std::io::IsTerminal as _;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use safelog::with_safe_logging_suppressed;
use tokio::net::TcpListener;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

use veil_directory::{cli::Cli, config::DirectoryConfig, registry::Registry, server};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = main_main(cli) {
        with_safe_logging_suppressed(|| veil_error::report_and_exit::<_, ()>(e));
    }
}

fn main_main(cli: Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(cli.log_level.parse().context("invalid --log-level")?)
        .parse("")
        .expect("empty filter directive should be trivially parsable");
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .finish()
        .init();

    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) if path.exists() => {
            DirectoryConfig::load(&path).context("failed to load configuration")?
        }
        _ => DirectoryConfig::default(),
    };
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(run(config))
}

/// The default config file location, following XDG/platform conventions.
fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "veil")
        .map(|dirs| dirs.config_dir().join("directory.toml"))
}

async fn run(config: DirectoryConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("failed to bind directory port {}", config.listen_port))?;
    let registry = Arc::new(Registry::new());
    server::run(listener, registry, Arc::new(config)).await
}
