//! Autoscaler mode.
//!
//! Runs the scaling loop on `monitor_interval` and serves the autoscaler
//! router (call notifications and `/status`).

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::info;

use fngrid_autoscale::Autoscaler;
use fngrid_core::FngridConfig;

/// Run the autoscaler until shutdown.
pub async fn run_autoscaler(config: FngridConfig) -> anyhow::Result<()> {
    info!("fngrid autoscaler starting");

    let autoscaler = Autoscaler::from_config(&config);
    info!(
        capacity = config.per_instance_capacity,
        up = config.scale_up_threshold,
        down = config.scale_down_threshold,
        min = config.min_instances_per_function,
        max = config.max_instances_per_function,
        window_secs = config.metrics_window_secs,
        "scaling policy"
    );

    // ── Shutdown signal ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Scaling loop ────────────────────────────────────────────
    let scaler = autoscaler.clone();
    let interval = config.monitor_interval();
    let scale_handle = tokio::spawn(async move {
        scaler.run(interval, shutdown_rx).await;
    });

    // ── HTTP server ─────────────────────────────────────────────
    let router = fngrid_api::autoscaler_router(autoscaler);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.autoscaler_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "autoscaler listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            crate::shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = scale_handle.await;
    info!("fngrid autoscaler stopped");
    Ok(())
}
