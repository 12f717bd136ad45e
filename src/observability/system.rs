//! Host resource sampling.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::System;

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    /// Fraction of memory in use (0..=1).
    pub percentage: f64,
}

/// CPU figures.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    pub count: usize,
    /// Fraction of CPU in use across all cores (0..=1).
    pub usage: f64,
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
}

/// One system resource sample.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub timestamp: DateTime<Utc>,
}

/// Reuses one `System` so CPU usage is measured between consecutive samples.
pub struct SystemSampler {
    sys: Mutex<System>,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();
        Self {
            sys: Mutex::new(sys),
        }
    }

    /// Refresh and read current resource usage.
    pub fn sample(&self) -> SystemSnapshot {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        sys.refresh_cpu();

        let total = sys.total_memory();
        let free = sys.available_memory();
        let used = total.saturating_sub(free);
        let percentage = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        };

        let load = System::load_average();

        SystemSnapshot {
            memory: MemoryUsage {
                total,
                free,
                used,
                percentage,
            },
            cpu: CpuUsage {
                count: sys.cpus().len(),
                usage: f64::from(sys.global_cpu_info().cpu_usage()) / 100.0,
                load_average: [load.one, load.five, load.fifteen],
            },
            timestamp: Utc::now(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
