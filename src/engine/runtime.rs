use super::graph::{BuildError, ExecutionGraph};
use super::scheduler::{ExecStats, Scheduler};
use crate::loader::BlockProvider;
use crate::manifest::Manifest;
use crate::observability::MetricsCollector;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// A stats line is logged every this many ticks.
const STATS_LOG_INTERVAL: u64 = 10;

/// Runtime status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Stopped,
    Initializing,
    Running,
    Error,
}

/// Execution-loop options. Rate control lives here, not in the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Tick rate in Hz.
    pub rate_hz: u32,
    /// Stop after this many ticks; `None` runs until cancelled.
    pub max_iterations: Option<u64>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            rate_hz: 10,
            max_iterations: None,
        }
    }
}

/// Orchestrates a pipeline: owns the scheduler and metrics, drives the
/// fixed-rate loop, and tears the graph down on shutdown.
pub struct PipelineRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
    status: RuntimeStatus,
}

impl PipelineRuntime {
    /// Build the execution graph from a manifest and wrap it in a runtime.
    pub fn build(
        manifest: &Manifest,
        provider: &dyn BlockProvider,
        options: RuntimeOptions,
    ) -> Result<Self, BuildError> {
        let graph = ExecutionGraph::build(manifest, provider)?;
        let metrics = Arc::new(MetricsCollector::new());
        Ok(Self {
            scheduler: Scheduler::new(graph, metrics),
            options,
            status: RuntimeStatus::Stopped,
        })
    }

    pub fn status(&self) -> RuntimeStatus {
        self.status
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.scheduler.metrics().clone()
    }

    pub fn stats(&self) -> ExecStats {
        self.scheduler.stats()
    }

    /// Initialize the blocks and drive the tick loop until `stop` flips to
    /// true or the iteration limit is reached. Returns the final stats.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<ExecStats> {
        if self.scheduler.graph().nodes.is_empty() {
            self.status = RuntimeStatus::Error;
            bail!("execution graph has no runnable nodes");
        }

        self.status = RuntimeStatus::Initializing;
        if !self.scheduler.initialize() {
            warn!("some blocks failed to initialize, continuing with degraded pipeline");
        }

        let period =
            Duration::from_millis((1000 / u64::from(self.options.rate_hz.max(1))).max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            rate_hz = self.options.rate_hz,
            iterations = ?self.options.max_iterations,
            "starting pipeline execution"
        );
        self.status = RuntimeStatus::Running;

        let mut iteration: u64 = 0;
        loop {
            if let Some(max) = self.options.max_iterations {
                if iteration >= max {
                    break;
                }
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = wait_for_stop(&mut stop) => break,
            }

            let tick_start = Instant::now();
            self.scheduler.execute_tick();
            let elapsed = tick_start.elapsed();
            if elapsed > period {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = period.as_millis() as u64,
                    "tick exceeded target period"
                );
            }

            iteration += 1;
            if iteration % STATS_LOG_INTERVAL == 0 {
                let stats = self.scheduler.stats();
                info!(
                    iteration,
                    avg_ms = stats.avg_execution_time_ms,
                    errors = stats.total_errors,
                    "pipeline running"
                );
            }
        }

        self.status = RuntimeStatus::Stopped;
        Ok(self.scheduler.stats())
    }

    /// Shut down all blocks. Idempotent.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.status = RuntimeStatus::Stopped;
    }
}

/// Resolves once stop flips to true. A closed channel means the caller
/// gave up its stop handle; the pipeline keeps running.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
