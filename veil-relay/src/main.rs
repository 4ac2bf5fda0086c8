//! The veil relay binary.

use std::io::IsTerminal as _;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fs_mistrust::Mistrust;
use safelog::with_safe_logging_suppressed;
use tokio::net::TcpListener;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

use veil_relay::{cli::Cli, config::RelayConfig, registration, server};

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
        Some(path) if path.exists() => RelayConfig::load(&path).context("failed to load configuration")?,
        _ => RelayConfig::default(),
    };
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(relay_id) = cli.relay_id {
        config.relay_id = relay_id;
    }
    if let Some(state_dir) = cli.state_dir {
        config.state_dir = state_dir;
    }
    if cli.disable_fs_permission_checks {
        config.disable_fs_permission_checks = true;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(run(config))
}

/// The default config file location, following XDG/platform conventions.
fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "veil").map(|dirs| dirs.config_dir().join("relay.toml"))
}

async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("failed to bind relay port {}", config.listen_port))?;

    let mistrust = if config.disable_fs_permission_checks {
        Mistrust::new_dangerously_trust_everyone()
    } else {
        Mistrust::new()
    };
    let key_path = veil_persist::relay_key_path(&config.state_dir, &config.relay_id);
    let identity = Arc::new(
        veil_persist::load_or_generate_relay_key(&mistrust, &key_path).context("failed to load relay identity key")?,
    );

    let config = Arc::new(config);
    tokio::spawn(registration::run(Arc::clone(&identity), Arc::clone(&config)));

    server::run(listener, identity, config).await
}
