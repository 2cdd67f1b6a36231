use super::graph::{BuildError, ExecutionGraph, ExecutionNode, Wire};
use crate::core::{Value, ValueTag};
use crate::observability::MetricsCollector;
use serde::Serialize;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Aggregate executor statistics, updated once per tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ExecStats {
    pub total_executions: u64,
    pub total_errors: u64,
    pub avg_execution_time_ms: f64,
}

/// Kahn's algorithm over the wired nodes.
///
/// The ready set is a max-heap, so when several nodes become ready at once
/// they are emitted in descending node-id order. That tie-break is the
/// single fixed ordering; it depends only on the edges and node ids.
pub fn topo_order(
    nodes: &BTreeMap<i32, ExecutionNode>,
    wires: &[Wire],
) -> Result<Vec<i32>, BuildError> {
    let mut in_degree: BTreeMap<i32, usize> = nodes.keys().map(|&id| (id, 0)).collect();
    let mut successors: HashMap<i32, Vec<i32>> = HashMap::new();

    for wire in wires {
        successors
            .entry(wire.from_node_id)
            .or_default()
            .push(wire.to_node_id);
        if let Some(degree) = in_degree.get_mut(&wire.to_node_id) {
            *degree += 1;
        }
    }

    let mut ready: BinaryHeap<i32> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = ready.pop() {
        order.push(id);
        if let Some(next) = successors.get(&id) {
            for &succ in next {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(succ);
                    }
                }
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(BuildError::CycleDetected);
    }
    Ok(order)
}

/// Drives the execution graph: one blocking pass over the topological
/// order per tick, transferring pin values along the wires.
///
/// Single-threaded within a tick. Rate control belongs to the caller.
pub struct Scheduler {
    graph: ExecutionGraph,
    /// Wire indices grouped by consuming node.
    incoming: HashMap<i32, Vec<usize>>,
    stats: ExecStats,
    metrics: Arc<MetricsCollector>,
    /// (wire index, from tag, to tag) triples already warned about.
    coercion_warned: HashSet<(usize, ValueTag, ValueTag)>,
    initialized: Option<bool>,
    shut_down: bool,
}

impl Scheduler {
    pub fn new(graph: ExecutionGraph, metrics: Arc<MetricsCollector>) -> Self {
        let mut incoming: HashMap<i32, Vec<usize>> = HashMap::new();
        for (index, wire) in graph.wires.iter().enumerate() {
            incoming.entry(wire.to_node_id).or_default().push(index);
        }
        Self {
            graph,
            incoming,
            stats: ExecStats::default(),
            metrics,
            coercion_warned: HashSet::new(),
            initialized: None,
            shut_down: false,
        }
    }

    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn order(&self) -> &[i32] {
        &self.graph.order
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Initialize every node's block with its config, in execution order.
    /// Failures are warnings; the node stays in the graph and will likely
    /// produce zeros. Blocks are only ever initialized once; repeated
    /// calls return the first outcome.
    pub fn initialize(&mut self) -> bool {
        if let Some(ok) = self.initialized {
            return ok;
        }
        let mut all_ok = true;
        for &node_id in &self.graph.order {
            let Some(node) = self.graph.nodes.get(&node_id) else {
                continue;
            };
            let ok = node.block.with(|b| b.initialize(&node.config));
            if !ok {
                warn!(node = node_id, block = %node.block.key(), "block failed to initialize");
                all_ok = false;
            }
        }
        if all_ok {
            info!(nodes = self.graph.nodes.len(), "all blocks initialized");
        }
        self.initialized = Some(all_ok);
        all_ok
    }

    /// Execute one full pass over the graph.
    ///
    /// Per-node failures are contained: a block returning `false` keeps its
    /// previous outputs visible downstream and bumps the error counter.
    /// The tick itself never aborts.
    pub fn execute_tick(&mut self) {
        let tick_start = Instant::now();

        for position in 0..self.graph.order.len() {
            let node_id = self.graph.order[position];
            self.transfer_inputs(node_id);

            let Some(node) = self.graph.nodes.get_mut(&node_id) else {
                continue;
            };
            let block_id = node.block.key().id.clone();

            let exec_start = Instant::now();
            let ok = node.block.with(|b| b.execute());
            let latency_ms = exec_start.elapsed().as_secs_f64() * 1000.0;
            self.metrics.record_execution(&block_id, latency_ms);

            if !ok {
                warn!(node = node_id, block = %block_id, "block execution failed");
                self.stats.total_errors += 1;
                continue;
            }

            for pin_index in 0..node.output_pins.len() {
                let pin_name = node.output_pins[pin_index].name.clone();
                let value = node.block.with(|b| b.get_output(&pin_name));
                self.metrics.record_output(
                    &block_id,
                    &pin_name,
                    value.to_display_string(),
                    value.tag().to_string(),
                );
                node.output_snapshot.insert(pin_name, value);
            }
        }

        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        self.stats.total_executions += 1;
        let n = self.stats.total_executions;
        self.stats.avg_execution_time_ms =
            (self.stats.avg_execution_time_ms * (n - 1) as f64 + tick_ms) / n as f64;
    }

    /// Copy upstream output snapshots onto this node's input pins,
    /// coercing to the declared input type. Absent upstream values leave
    /// the input stale; failed coercions drop the transfer for this tick.
    fn transfer_inputs(&mut self, node_id: i32) {
        let Some(wire_indices) = self.incoming.get(&node_id) else {
            return;
        };

        for &index in wire_indices {
            let wire = &self.graph.wires[index];

            let Some(upstream) = self
                .graph
                .nodes
                .get(&wire.from_node_id)
                .and_then(|n| n.output_snapshot.get(&wire.from_pin))
                .cloned()
            else {
                continue;
            };

            let value = match wire.target_type.tag() {
                None => upstream,
                Some(tag) => match upstream.coerce(tag) {
                    Ok(value) => value,
                    Err(err) => {
                        if self.coercion_warned.insert((index, err.from, err.to)) {
                            warn!(
                                from = wire.from_node_id,
                                from_pin = %wire.from_pin,
                                to = wire.to_node_id,
                                to_pin = %wire.to_pin,
                                error = %err,
                                "transfer dropped: value does not coerce to input type"
                            );
                        }
                        continue;
                    }
                },
            };

            let to_pin = wire.to_pin.clone();
            if let Some(node) = self.graph.nodes.get_mut(&wire.to_node_id) {
                node.input_snapshot.insert(to_pin.clone(), value.clone());
                node.block.with(|b| b.set_input(&to_pin, value));
            }
        }
    }

    /// Value on an output pin of a node, as of the last tick it produced.
    pub fn node_output(&self, node_id: i32, pin: &str) -> Option<&Value> {
        self.graph
            .nodes
            .get(&node_id)
            .and_then(|n| n.output_snapshot.get(pin))
    }

    /// All output values of a node.
    pub fn node_outputs(&self, node_id: i32) -> HashMap<String, Value> {
        self.graph
            .nodes
            .get(&node_id)
            .map(|n| n.output_snapshot.clone())
            .unwrap_or_default()
    }

    /// Shut down every distinct block instance exactly once, in reverse
    /// execution order. Safe to call more than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let mut seen = HashSet::new();
        for &node_id in self.graph.order.iter().rev() {
            let Some(node) = self.graph.nodes.get(&node_id) else {
                continue;
            };
            if seen.insert(Arc::as_ptr(&node.block)) {
                node.block.with(|b| b.shutdown());
            }
        }
        info!(blocks = seen.len(), "all blocks shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
