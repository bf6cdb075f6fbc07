//! Command-line host for the reader engine.
//!
//! Responsibilities here are intentionally minimal:
//! - Initialise logging and apply the configured level.
//! - Load configuration from `conf/config.toml` (or `LEAFVIEW_CONFIG_PATH`).
//! - Dispatch to the `pages` or `narrate` command on a tokio runtime.

mod backend;
mod cli;
mod playback;

use crate::cli::{Command, parse_args, run_narrate, run_pages};
use anyhow::{Context, Result};
use leafview_core::cancellation::CancellationToken;
use leafview_core::config::load_config;
use std::env;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    let config_path = env::var_os("LEAFVIEW_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        config = %config_path.display(),
        level = %config.log_level,
        preload_ahead = config.preload_ahead,
        engine = %config.narration_engine,
        "Starting leafview"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received; shutting down");
            cancel.cancel();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;
    runtime.block_on(async {
        match command {
            Command::Pages { dir } => run_pages(&dir, &config, &cancel).await,
            Command::Narrate { file, save } => run_narrate(&file, save, &config, &cancel).await,
        }
    })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        info!("RUST_LOG is set; keeping its filter");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
