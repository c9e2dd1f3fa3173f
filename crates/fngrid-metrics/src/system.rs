//! Host load sampling for the autoscaler status snapshot.
//!
//! CPU usage is estimated from the one-minute load average relative to the
//! number of online CPUs; memory usage comes from physical/available pages.

use fngrid_core::SystemMetrics;

/// Sample the host. Any reading that fails reports 0.
pub fn collect() -> SystemMetrics {
    let load_avg = load_average_1m();
    SystemMetrics {
        cpu_usage: estimate_cpu_percent(load_avg, online_cpus()),
        memory_usage: memory_percent(),
        load_avg,
    }
}

fn load_average_1m() -> f64 {
    let mut loads = [0f64; 3];
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if n <= 0 {
        return 0.0;
    }
    loads[0]
}

fn online_cpus() -> i64 {
    unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) as i64 }
}

fn estimate_cpu_percent(load1: f64, ncpu: i64) -> f64 {
    if ncpu <= 0 {
        return 0.0;
    }
    ((load1 / ncpu as f64) * 100.0).clamp(0.0, 100.0)
}

#[cfg(target_os = "linux")]
fn memory_percent() -> f64 {
    let phys_pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let avail_pages = unsafe { libc::sysconf(libc::_SC_AVPHYS_PAGES) };
    if phys_pages <= 0 || avail_pages < 0 {
        return 0.0;
    }
    let used = (phys_pages - avail_pages).max(0);
    ((used as f64) / (phys_pages as f64) * 100.0).clamp(0.0, 100.0)
}

#[cfg(not(target_os = "linux"))]
fn memory_percent() -> f64 {
    0.0
}
