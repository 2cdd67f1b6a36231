use super::metrics::MetricsCollector;
use std::sync::Arc;

/// Renders human-readable reports from the metrics collector. The observer
/// surface serializes snapshots directly; this is for logs and the CLI.
pub struct PipelineMonitor {
    collector: Arc<MetricsCollector>,
}

impl PipelineMonitor {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.blocks.is_empty() {
            return "No block executions recorded".to_string();
        }

        let mut report = String::from("=== Pipeline Metrics ===\n");
        for block in &snapshot.blocks {
            report.push_str(&format!(
                "\n[{}]\n  Executions: {}\n  Avg Latency: {:.3} ms\n  Last Output: {} ({})\n",
                block.block_id,
                block.execution_count,
                block.avg_latency_ms,
                if block.last_output_value.is_empty() {
                    "-"
                } else {
                    block.last_output_value.as_str()
                },
                if block.last_output_type.is_empty() {
                    "-"
                } else {
                    block.last_output_type.as_str()
                },
            ));
        }
        report.push_str(&format!(
            "\nUptime: {}s\n",
            snapshot.system.uptime_seconds
        ));

        report
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }
}
