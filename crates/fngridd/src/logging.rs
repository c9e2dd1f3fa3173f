//! Tracing setup.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info,fngridd=debug,fngrid=debug";

/// Install the global subscriber.
///
/// Logs go to stdout, and additionally to `<log_dir>/<process>.log` when a
/// directory is given. The returned guard flushes the file writer on drop.
pub fn init(process: &str, json: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log dir: {}", dir.display()))?;
            let path = dir.join(format!("{process}.log"));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            Some(tracing_appender::non_blocking(file))
        }
        None => None,
    };

    let guard = match (json, file) {
        (true, Some((writer, guard))) => {
            let stdout_layer = tracing_subscriber::fmt::layer().json().with_target(true);
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(writer);
            registry.with(stdout_layer).with(file_layer).try_init()?;
            Some(guard)
        }
        (false, Some((writer, guard))) => {
            let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            registry.with(stdout_layer).with(file_layer).try_init()?;
            Some(guard)
        }
        (true, None) => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .try_init()?;
            None
        }
        (false, None) => {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init()?;
            None
        }
    };

    Ok(guard)
}
