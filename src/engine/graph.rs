use crate::core::{BlockConfig, PinDescriptor, PinType, Value};
use crate::loader::{BlockHandle, BlockProvider};
use crate::manifest::Manifest;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Graph construction failure. Everything here is fatal at startup;
/// recoverable conditions (missing blocks, incompatible edges) are logged
/// and the graph is built without them.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("duplicate node id {0} in manifest")]
    DuplicateNode(i32),

    #[error("connection references unknown node {node_id}")]
    UnknownNode { node_id: i32 },

    #[error("node {node_id} has no {direction} pin named `{pin}`")]
    MissingPin {
        node_id: i32,
        pin: String,
        direction: &'static str,
    },

    #[error("pin `{pin}` on node {node_id} is an {actual} pin, expected {expected}")]
    DirectionMismatch {
        node_id: i32,
        pin: String,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("cycle detected in execution graph")]
    CycleDetected,
}

/// A validated edge, carrying the declared type of the input pin it feeds
/// so the scheduler can coerce transfers without re-resolving pins.
#[derive(Debug, Clone)]
pub struct Wire {
    pub from_node_id: i32,
    pub from_pin: String,
    pub to_node_id: i32,
    pub to_pin: String,
    pub target_type: PinType,
}

/// One node of the execution graph: a block instance plus the per-node
/// pin snapshots the scheduler maintains.
pub struct ExecutionNode {
    pub node_id: i32,
    pub node_type: String,
    pub block: BlockHandle,
    pub config: BlockConfig,
    pub input_pins: Vec<PinDescriptor>,
    pub output_pins: Vec<PinDescriptor>,
    pub input_snapshot: HashMap<String, Value>,
    pub output_snapshot: HashMap<String, Value>,
}

/// The built pipeline: nodes, validated wires, and the execution order.
pub struct ExecutionGraph {
    pub nodes: BTreeMap<i32, ExecutionNode>,
    pub wires: Vec<Wire>,
    pub order: Vec<i32>,
}

impl ExecutionGraph {
    /// Build the graph from a parsed manifest, acquiring block instances
    /// from `provider`. Nodes whose block cannot be resolved or loaded are
    /// skipped with a warning, along with every edge touching them.
    pub fn build(
        manifest: &Manifest,
        provider: &dyn BlockProvider,
    ) -> Result<ExecutionGraph, BuildError> {
        let mut declared_ids = HashSet::new();
        for node in manifest.nodes() {
            if !declared_ids.insert(node.id) {
                return Err(BuildError::DuplicateNode(node.id));
            }
        }

        let mut nodes: BTreeMap<i32, ExecutionNode> = BTreeMap::new();
        let mut referenced_blocks: HashSet<&str> = HashSet::new();

        for node in manifest.nodes() {
            let Some(block_id) = resolve_block_id(&node.node_type, manifest) else {
                warn!(node = node.id, node_type = %node.node_type, "unknown node type, skipping node");
                continue;
            };

            let version = manifest
                .block_reference(&block_id)
                .map(|b| b.version.clone())
                .unwrap_or_else(|| "1.0.0".to_string());

            let block = match provider.acquire(&block_id, &version) {
                Ok(block) => block,
                Err(err) => {
                    warn!(
                        node = node.id,
                        block = %block_id,
                        version = %version,
                        error = %err,
                        "failed to load block, skipping node"
                    );
                    continue;
                }
            };

            if let Some(reference) = manifest.block_reference(&block_id) {
                referenced_blocks.insert(reference.id.as_str());
            }

            let (input_pins, output_pins) = block.with(|b| (b.input_pins(), b.output_pins()));

            nodes.insert(
                node.id,
                ExecutionNode {
                    node_id: node.id,
                    node_type: node.node_type.clone(),
                    block,
                    config: node.config.clone(),
                    input_pins,
                    output_pins,
                    input_snapshot: HashMap::new(),
                    output_snapshot: HashMap::new(),
                },
            );
        }

        for reference in &manifest.blocks {
            if !referenced_blocks.contains(reference.id.as_str()) {
                warn!(block = %reference.id, "declared block is not referenced by any node");
            }
        }

        let mut wires = Vec::new();
        for conn in manifest.connections() {
            for endpoint in [conn.from_node_id, conn.to_node_id] {
                if !declared_ids.contains(&endpoint) {
                    return Err(BuildError::UnknownNode { node_id: endpoint });
                }
            }

            // Edges touching a skipped node are dropped, not fatal.
            let (Some(from), Some(to)) = (nodes.get(&conn.from_node_id), nodes.get(&conn.to_node_id))
            else {
                warn!(
                    from = conn.from_node_id,
                    to = conn.to_node_id,
                    "dropping connection to skipped node"
                );
                continue;
            };

            let from_pin = find_pin(from, &conn.from_pin, PinRole::Output)?;
            let to_pin = find_pin(to, &conn.to_pin, PinRole::Input)?;

            if !from_pin.pin_type.connects_to(to_pin.pin_type) {
                warn!(
                    from = conn.from_node_id,
                    from_pin = %conn.from_pin,
                    to = conn.to_node_id,
                    to_pin = %conn.to_pin,
                    from_type = %from_pin.pin_type,
                    to_type = %to_pin.pin_type,
                    "incompatible pin types, dropping connection"
                );
                continue;
            }

            wires.push(Wire {
                from_node_id: conn.from_node_id,
                from_pin: conn.from_pin.clone(),
                to_node_id: conn.to_node_id,
                to_pin: conn.to_pin.clone(),
                target_type: to_pin.pin_type,
            });
        }

        let order = super::scheduler::topo_order(&nodes, &wires)?;

        Ok(ExecutionGraph {
            nodes,
            wires,
            order,
        })
    }

    pub fn node(&self, node_id: i32) -> Option<&ExecutionNode> {
        self.nodes.get(&node_id)
    }
}

enum PinRole {
    Input,
    Output,
}

fn find_pin<'a>(
    node: &'a ExecutionNode,
    pin: &str,
    role: PinRole,
) -> Result<&'a PinDescriptor, BuildError> {
    let (expected_set, other_set, expected, actual) = match role {
        PinRole::Output => (&node.output_pins, &node.input_pins, "output", "input"),
        PinRole::Input => (&node.input_pins, &node.output_pins, "input", "output"),
    };

    if let Some(descriptor) = expected_set.iter().find(|p| p.name == pin) {
        return Ok(descriptor);
    }
    if other_set.iter().any(|p| p.name == pin) {
        return Err(BuildError::DirectionMismatch {
            node_id: node.node_id,
            pin: pin.to_string(),
            actual,
            expected,
        });
    }
    Err(BuildError::MissingPin {
        node_id: node.node_id,
        pin: pin.to_string(),
        direction: expected,
    })
}

/// Resolve a manifest node type to a declared block id. The manifest's own
/// block list wins; the compat table only covers manifests produced before
/// node types embedded their block id.
fn resolve_block_id(node_type: &str, manifest: &Manifest) -> Option<String> {
    if let Some(reference) = manifest.blocks.iter().find(|b| node_type.contains(&b.id)) {
        return Some(reference.id.clone());
    }

    #[cfg(feature = "compat-node-types")]
    if let Some(id) = compat_block_id(node_type) {
        return Some(id.to_string());
    }

    None
}

/// Fixed rewrite table for legacy node types.
#[cfg(feature = "compat-node-types")]
fn compat_block_id(node_type: &str) -> Option<&'static str> {
    if node_type.contains("adxl345") {
        Some("adxl345-sensor")
    } else if node_type.contains("bme280") {
        Some("bme280-sensor")
    } else if node_type.contains("sliding_window") {
        Some("sliding-window")
    } else if node_type.contains("lowpass") || node_type.contains("low_pass") {
        Some("low-pass-filter")
    } else if node_type.contains("channel_merge") {
        Some("channel-merge")
    } else if node_type.contains("timesnet") {
        Some("timesnet")
    } else if node_type.contains("gpio") && node_type.contains("output") {
        Some("gpio-output")
    } else if node_type.contains("oled") {
        Some("oled-display")
    } else if node_type.contains("mqtt") {
        Some("mqtt-publisher")
    } else {
        None
    }
}

#[cfg(all(test, feature = "compat-node-types"))]
mod tests {
    use super::compat_block_id;

    #[test]
    fn test_compat_rewrites() {
        assert_eq!(
            compat_block_id("input.accelerometer.adxl345"),
            Some("adxl345-sensor")
        );
        assert_eq!(
            compat_block_id("processing.filter.low_pass"),
            Some("low-pass-filter")
        );
        assert_eq!(compat_block_id("output.gpio.led"), Some("gpio-output"));
        assert_eq!(compat_block_id("output.display.oled"), Some("oled-display"));
        assert_eq!(compat_block_id("something.else"), None);
    }
}
