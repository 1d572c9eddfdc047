//! Logging setup
//!
//! The library only emits `tracing` events. Hosts that don't install their
//! own subscriber can call one of these once at startup. `RUST_LOG` wins over
//! the default `info` level.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";
const LOG_FILE_PREFIX: &str = "access-policy.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Log to stderr
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_err() {
        tracing::debug!("[Logging] Subscriber already installed, keeping it");
    }
    Ok(())
}

/// Log JSON lines to a daily rotated file under `dir`
///
/// Keep the returned guard alive for as long as events should be flushed.
pub fn init_file_logging(dir: impl AsRef<Path>) -> Result<WorkerGuard> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    if installed.is_err() {
        tracing::debug!("[Logging] Subscriber already installed, file logging not enabled");
    } else {
        tracing::info!("[Logging] Writing logs to {}", dir.display());
    }
    Ok(guard)
}
