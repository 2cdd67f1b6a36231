pub mod metrics;
pub mod monitor;

pub use metrics::{BlockMetrics, MetricsCollector, MetricsSnapshot, SystemMetrics};
pub use monitor::PipelineMonitor;
