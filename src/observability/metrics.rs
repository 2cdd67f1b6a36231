use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Per-block execution record. Keyed by block id, so multiple nodes of the
/// same block share one record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockMetrics {
    pub block_id: String,
    pub execution_count: u64,
    pub total_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub last_output_value: String,
    pub last_output_type: String,
    /// Wall-clock stamp of the last recorded execution, ms since epoch.
    pub last_execution_time: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub uptime_seconds: u64,
}

/// Consistent view of all metrics at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub blocks: Vec<BlockMetrics>,
    pub system: SystemMetrics,
    /// Snapshot wall-clock stamp, ms since epoch.
    pub timestamp: u64,
}

#[derive(Default)]
struct CpuSample {
    prev_idle: u64,
    prev_total: u64,
}

struct Inner {
    blocks: HashMap<String, BlockMetrics>,
    cpu: CpuSample,
    start_time: Instant,
}

/// Thread-safe metrics aggregator: writes from the scheduler thread, reads
/// from observer threads. One mutex guards all records; readers never see
/// a torn record.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                blocks: HashMap::new(),
                cpu: CpuSample::default(),
                start_time: Instant::now(),
            }),
        }
    }

    /// Record one execution of `block_id` taking `latency_ms`.
    pub fn record_execution(&self, block_id: &str, latency_ms: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let record = inner
            .blocks
            .entry(block_id.to_string())
            .or_insert_with(|| BlockMetrics {
                block_id: block_id.to_string(),
                ..BlockMetrics::default()
            });
        record.execution_count += 1;
        record.total_latency_ms += latency_ms;
        record.avg_latency_ms = record.total_latency_ms / record.execution_count as f64;
        record.last_execution_time = epoch_millis();
    }

    /// Record the latest output of `block_id` for observer display.
    pub fn record_output(&self, block_id: &str, pin: &str, value: String, type_tag: String) {
        debug!(block = block_id, pin, value = %value, "output recorded");
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let record = inner
            .blocks
            .entry(block_id.to_string())
            .or_insert_with(|| BlockMetrics {
                block_id: block_id.to_string(),
                ..BlockMetrics::default()
            });
        record.last_output_value = value;
        record.last_output_type = type_tag;
    }

    /// The record for one block, if any execution has been recorded.
    pub fn block_metrics(&self, block_id: &str) -> Option<BlockMetrics> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .blocks
            .get(block_id)
            .cloned()
    }

    /// Atomic view of every block record plus system counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let mut blocks: Vec<BlockMetrics> = inner.blocks.values().cloned().collect();
        blocks.sort_by(|a, b| a.block_id.cmp(&b.block_id));

        let mut system = read_system_metrics(&mut inner.cpu);
        system.uptime_seconds = inner.start_time.elapsed().as_secs();

        MetricsSnapshot {
            blocks,
            system,
            timestamp: epoch_millis(),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.clear();
        inner.start_time = Instant::now();
    }

    pub fn reset_block(&self, block_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.remove(block_id);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Platform counters. Missing figures report zero.
#[cfg(target_os = "linux")]
fn read_system_metrics(cpu: &mut CpuSample) -> SystemMetrics {
    let mut metrics = SystemMetrics::default();

    if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
        let field = |name: &str| {
            meminfo
                .lines()
                .find(|l| l.starts_with(name))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };
        let total_kb = field("MemTotal:");
        let available_kb = field("MemAvailable:");
        metrics.memory_total_mb = total_kb / 1024;
        metrics.memory_used_mb = total_kb.saturating_sub(available_kb) / 1024;
    }

    if let Ok(stat) = std::fs::read_to_string("/proc/stat") {
        // "cpu  user nice system idle ..."
        if let Some(line) = stat.lines().next() {
            let fields: Vec<u64> = line
                .split_whitespace()
                .skip(1)
                .filter_map(|v| v.parse().ok())
                .collect();
            if fields.len() >= 4 {
                let idle = fields[3];
                let total: u64 = fields.iter().sum();
                if cpu.prev_total > 0 && total > cpu.prev_total {
                    let total_diff = total - cpu.prev_total;
                    let idle_diff = idle.saturating_sub(cpu.prev_idle);
                    metrics.cpu_usage_percent =
                        100.0 * (1.0 - idle_diff as f64 / total_diff as f64);
                }
                cpu.prev_idle = idle;
                cpu.prev_total = total;
            }
        }
    }

    metrics
}

#[cfg(not(target_os = "linux"))]
fn read_system_metrics(_cpu: &mut CpuSample) -> SystemMetrics {
    SystemMetrics::default()
}
