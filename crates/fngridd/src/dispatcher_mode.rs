//! Dispatcher mode: function gateway process.
//!
//! In this mode, the daemon:
//! 1. Builds the function registry (all built-ins or the `--functions` subset)
//! 2. Creates the function table and invoker
//! 3. Starts the instance sync loop against the autoscaler
//! 4. Starts the periodic statistics report
//! 5. Serves the dispatcher router until Ctrl-C / SIGTERM

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::bail;
use tokio::sync::watch;
use tracing::info;

use fngrid_api::DispatcherState;
use fngrid_core::FngridConfig;
use fngrid_functions::FunctionRegistry;
use fngrid_lifecycle::{FunctionTable, Invoker};
use fngrid_sync::{InstanceSync, Notifier};

/// Registry with the requested built-ins; an empty list enables all.
async fn build_registry(enabled: &[String]) -> anyhow::Result<FunctionRegistry> {
    if enabled.is_empty() {
        return Ok(FunctionRegistry::with_builtins().await);
    }

    let builtins = fngrid_functions::builtin::all();
    let registry = FunctionRegistry::new();
    for name in enabled {
        let Some((_, handler)) = builtins.iter().find(|(n, _)| n == name) else {
            bail!("unknown built-in function: {name}");
        };
        registry.register(name, handler.clone()).await?;
    }
    Ok(registry)
}

/// Log one line per function with its counters.
async fn report(table: &FunctionTable) {
    let status = table.status().await;
    info!(
        uptime_secs = status.uptime,
        functions = status.functions.len(),
        "dispatcher report"
    );
    for (function, f) in &status.functions {
        info!(
            %function,
            instances = f.instances,
            active = f.active_requests,
            cold_starts = f.cold_starts,
            total = f.stats.total_requests,
            successful = f.stats.successful_requests,
            failed = f.stats.failed_requests,
            timeouts = f.stats.timeout_requests,
            avg_ms = f.stats.avg_response_time,
            "function report"
        );
    }
}

async fn run_report(table: FunctionTable, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => report(&table).await,
            _ = shutdown.changed() => break,
        }
    }
}

/// Run the dispatcher until shutdown.
pub async fn run_dispatcher(config: FngridConfig, functions: Vec<String>) -> anyhow::Result<()> {
    info!("fngrid dispatcher starting");

    // ── Functions ───────────────────────────────────────────────
    let registry = build_registry(&functions).await?;
    let table = FunctionTable::new(config.min_instances_per_function);
    let invoker = Invoker::from_config(table.clone(), registry.clone(), &config);
    let registered = invoker.sync_registry().await;
    info!(functions = ?registry.names().await, "{registered} functions registered");

    // ── Autoscaler link ─────────────────────────────────────────
    let notifier = Notifier::from_config(&config);
    let sync = InstanceSync::from_config(table.clone(), &config);
    info!(autoscaler = %notifier.address(), "autoscaler link configured");

    // ── Shutdown signal ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_shutdown = shutdown_rx.clone();
    let report_shutdown = shutdown_rx;

    // ── Background tasks ────────────────────────────────────────
    let sync_handle = tokio::spawn(async move {
        sync.run(sync_shutdown).await;
    });
    let report_table = table.clone();
    let report_interval = config.report_interval();
    let report_handle = tokio::spawn(async move {
        run_report(report_table, report_interval, report_shutdown).await;
    });

    // ── HTTP server ─────────────────────────────────────────────
    let router = fngrid_api::dispatcher_router(DispatcherState { invoker, notifier });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.dispatcher_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dispatcher listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            crate::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = sync_handle.await;
    let _ = report_handle.await;

    // Final numbers before exit.
    report(&table).await;
    info!("fngrid dispatcher stopped");
    Ok(())
}
