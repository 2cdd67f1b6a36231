pub mod graph;
pub mod runtime;
pub mod scheduler;

pub use graph::{BuildError, ExecutionGraph, ExecutionNode, Wire};
pub use runtime::{PipelineRuntime, RuntimeOptions, RuntimeStatus};
pub use scheduler::{topo_order, ExecStats, Scheduler};
