pub mod core;
pub mod engine;
pub mod loader;
pub mod manifest;
pub mod observability;
pub mod registry;

pub use crate::core::{Block, BlockConfig, PinDescriptor, PinDirection, PinType, Value, ValueTag};
pub use engine::{ExecStats, ExecutionGraph, PipelineRuntime, RuntimeOptions, Scheduler};
pub use loader::{BlockHandle, BlockKey, BlockLoader, BlockProvider, LoadError};
pub use manifest::Manifest;
pub use observability::{MetricsCollector, PipelineMonitor};
pub use registry::BlockRegistry;
