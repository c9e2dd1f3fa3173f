//! Prometheus text exposition of the dispatcher snapshot.

use std::fmt::Write;

use fngrid_core::{DispatcherStatus, FunctionStatus};

/// Render a dispatcher snapshot in the Prometheus text format.
///
/// Every metric carries a `function` label.
pub fn render_prometheus(status: &DispatcherStatus) -> String {
    let mut out = String::new();

    gauge(&mut out, "fngrid_uptime_seconds", "Dispatcher uptime in seconds.");
    let _ = writeln!(out, "fngrid_uptime_seconds {:.0}", status.uptime);

    family(
        &mut out,
        status,
        "fngrid_instances",
        "gauge",
        "Instance count last synced from the autoscaler.",
        |f| f.instances.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_active_requests",
        "gauge",
        "Requests currently in flight.",
        |f| f.active_requests.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_cold_starts_total",
        "counter",
        "Simulated cold starts.",
        |f| f.cold_starts.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_requests_total",
        "counter",
        "Completed requests.",
        |f| f.stats.total_requests.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_requests_failed_total",
        "counter",
        "Requests that returned an error or timed out.",
        |f| f.stats.failed_requests.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_requests_timeout_total",
        "counter",
        "Requests terminated by the function timeout.",
        |f| f.stats.timeout_requests.to_string(),
    );
    family(
        &mut out,
        status,
        "fngrid_response_time_avg_ms",
        "gauge",
        "Average response time of successful requests, excluding cold-start delay.",
        |f| format!("{:.2}", f.stats.avg_response_time),
    );

    out
}

fn gauge(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn family(
    out: &mut String,
    status: &DispatcherStatus,
    name: &str,
    kind: &str,
    help: &str,
    value: impl Fn(&FunctionStatus) -> String,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    for (function, f) in &status.functions {
        let _ = writeln!(out, "{name}{{function=\"{function}\"}} {}", value(f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_headers_only() {
        let out = render_prometheus(&DispatcherStatus::default());
        assert!(out.contains("# TYPE fngrid_instances gauge"));
        assert!(out.contains("fngrid_uptime_seconds 0"));
        assert!(!out.contains("function=\""));
    }

    #[test]
    fn renders_labelled_values() {
        let mut status = DispatcherStatus {
            uptime: 12.0,
            ..Default::default()
        };
        let mut echo = FunctionStatus {
            instances: 3,
            cold_starts: 1,
            ..Default::default()
        };
        echo.stats.total_requests = 7;
        echo.stats.avg_response_time = 1.234;
        status.functions.insert("echo".to_string(), echo);

        let out = render_prometheus(&status);
        assert!(out.contains("fngrid_instances{function=\"echo\"} 3"));
        assert!(out.contains("fngrid_cold_starts_total{function=\"echo\"} 1"));
        assert!(out.contains("fngrid_requests_total{function=\"echo\"} 7"));
        assert!(out.contains("fngrid_response_time_avg_ms{function=\"echo\"} 1.23"));
    }
}
