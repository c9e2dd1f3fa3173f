//! fngridd — the fngrid daemon.
//!
//! One binary, two processes:
//! - `dispatcher`: serves function calls, simulates cold starts, keeps
//!   per-function statistics, notifies the autoscaler
//! - `autoscaler`: counts calls per function and steps instance counts
//!   toward the observed load
//!
//! # Usage
//!
//! ```text
//! fngridd autoscaler --port 3001
//! fngridd dispatcher --port 3000 --autoscaler-port 3001
//! fngridd --config fngrid.toml --log-dir ./logs dispatcher
//! ```

mod autoscaler_mode;
mod dispatcher_mode;
mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fngrid_core::FngridConfig;

#[derive(Parser)]
#[command(name = "fngridd", about = "fngrid serverless autoscaling simulator")]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long, global = true, env = "FNGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true, env = "FNGRID_LOG_JSON")]
    log_json: bool,

    /// Also append logs to `<dir>/<process>.log`.
    #[arg(long, global = true, env = "FNGRID_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dispatcher (function gateway).
    Dispatcher(DispatcherArgs),
    /// Run the autoscaler.
    Autoscaler(AutoscalerArgs),
}

#[derive(Args)]
struct DispatcherArgs {
    /// Port to listen on.
    #[arg(long, env = "FNGRID_DISPATCHER_PORT")]
    port: Option<u16>,

    /// Autoscaler host.
    #[arg(long, env = "FNGRID_AUTOSCALER_HOST")]
    autoscaler_host: Option<String>,

    /// Autoscaler port.
    #[arg(long, env = "FNGRID_AUTOSCALER_PORT")]
    autoscaler_port: Option<u16>,

    /// Per-call timeout in milliseconds.
    #[arg(long, env = "FNGRID_FUNCTION_TIMEOUT_MS")]
    function_timeout_ms: Option<u64>,

    /// Idle time after which the next call is a cold start.
    #[arg(long, env = "FNGRID_COLD_START_IDLE_MS")]
    cold_start_idle_ms: Option<u64>,

    /// Base cold-start delay; the actual delay is up to twice this.
    #[arg(long, env = "FNGRID_COLD_START_DELAY_MS")]
    cold_start_delay_ms: Option<u64>,

    /// How often instance counts are read back from the autoscaler.
    #[arg(long, env = "FNGRID_SYNC_INTERVAL_MS")]
    sync_interval_ms: Option<u64>,

    /// Built-in functions to enable (default: all).
    #[arg(long, env = "FNGRID_FUNCTIONS", value_delimiter = ',')]
    functions: Vec<String>,
}

#[derive(Args)]
struct AutoscalerArgs {
    /// Port to listen on.
    #[arg(long, env = "FNGRID_AUTOSCALER_PORT")]
    port: Option<u16>,

    /// Scaling cycle period in milliseconds.
    #[arg(long, env = "FNGRID_MONITOR_INTERVAL_MS")]
    monitor_interval_ms: Option<u64>,

    /// Window over which the call rate is computed.
    #[arg(long, env = "FNGRID_METRICS_WINDOW_SECS")]
    metrics_window_secs: Option<u64>,

    /// Calls per second one instance absorbs.
    #[arg(long, env = "FNGRID_PER_INSTANCE_CAPACITY")]
    per_instance_capacity: Option<f64>,

    /// Rate above which instances step up.
    #[arg(long, env = "FNGRID_SCALE_UP_THRESHOLD")]
    scale_up_threshold: Option<f64>,

    /// Rate below which instances may step down.
    #[arg(long, env = "FNGRID_SCALE_DOWN_THRESHOLD")]
    scale_down_threshold: Option<f64>,

    #[arg(long, env = "FNGRID_MIN_INSTANCES")]
    min_instances: Option<u32>,

    #[arg(long, env = "FNGRID_MAX_INSTANCES")]
    max_instances: Option<u32>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl DispatcherArgs {
    fn apply(&self, config: &mut FngridConfig) {
        set(&mut config.dispatcher_port, self.port);
        set(&mut config.autoscaler_host, self.autoscaler_host.clone());
        set(&mut config.autoscaler_port, self.autoscaler_port);
        set(&mut config.function_timeout_ms, self.function_timeout_ms);
        set(&mut config.cold_start_idle_threshold_ms, self.cold_start_idle_ms);
        set(&mut config.cold_start_base_delay_ms, self.cold_start_delay_ms);
        set(&mut config.sync_interval_ms, self.sync_interval_ms);
    }
}

impl AutoscalerArgs {
    fn apply(&self, config: &mut FngridConfig) {
        set(&mut config.autoscaler_port, self.port);
        set(&mut config.monitor_interval_ms, self.monitor_interval_ms);
        set(&mut config.metrics_window_secs, self.metrics_window_secs);
        set(&mut config.per_instance_capacity, self.per_instance_capacity);
        set(&mut config.scale_up_threshold, self.scale_up_threshold);
        set(&mut config.scale_down_threshold, self.scale_down_threshold);
        set(&mut config.min_instances_per_function, self.min_instances);
        set(&mut config.max_instances_per_function, self.max_instances);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FngridConfig::from_file(path)?,
        None => FngridConfig::default(),
    };

    let process = match &cli.command {
        Command::Dispatcher(args) => {
            args.apply(&mut config);
            "dispatcher"
        }
        Command::Autoscaler(args) => {
            args.apply(&mut config);
            "autoscaler"
        }
    };
    config.validate()?;

    // Held until exit so buffered file logs are flushed.
    let _log_guard = logging::init(process, cli.log_json, cli.log_dir.as_deref())?;

    match cli.command {
        Command::Dispatcher(args) => dispatcher_mode::run_dispatcher(config, args.functions).await,
        Command::Autoscaler(_) => autoscaler_mode::run_autoscaler(config).await,
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
