#![allow(dead_code)]

use cira_runtime::core::{Block, BlockConfig, PinDescriptor, PinType, Value};
use cira_runtime::registry::BlockRegistry;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle counters shared between a test and the block instances it
/// registered.
#[derive(Default)]
pub struct Probe {
    pub initialized: AtomicU64,
    pub executed: AtomicU64,
    pub shutdown: AtomicU64,
}

impl Probe {
    pub fn initialized(&self) -> u64 {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u64 {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Source block with a single typed `out` pin. Emits a configured value
/// on every successful execute; `value` in the config overrides floats.
pub struct Producer {
    block_id: &'static str,
    emit: Value,
    out_type: PinType,
    produced: Option<Value>,
    probe: Arc<Probe>,
}

impl Producer {
    pub fn new(block_id: &'static str, emit: Value, out_type: PinType, probe: Arc<Probe>) -> Self {
        Self {
            block_id,
            emit,
            out_type,
            produced: None,
            probe,
        }
    }

    pub fn float(block_id: &'static str, value: f32, probe: Arc<Probe>) -> Self {
        Self::new(block_id, Value::Float(value), PinType::Float, probe)
    }

    pub fn int(block_id: &'static str, value: i32, probe: Arc<Probe>) -> Self {
        Self::new(block_id, Value::Int(value), PinType::Int, probe)
    }
}

impl Block for Producer {
    fn id(&self) -> &str {
        self.block_id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn kind(&self) -> &str {
        "sensor"
    }

    fn input_pins(&self) -> Vec<PinDescriptor> {
        Vec::new()
    }

    fn output_pins(&self) -> Vec<PinDescriptor> {
        vec![PinDescriptor::output("out", self.out_type)]
    }

    fn initialize(&mut self, config: &BlockConfig) -> bool {
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = config.get("value").and_then(|v| v.parse::<f32>().ok()) {
            self.emit = Value::Float(value);
        }
        true
    }

    fn set_input(&mut self, _pin: &str, _value: Value) {}

    fn execute(&mut self) -> bool {
        self.probe.executed.fetch_add(1, Ordering::SeqCst);
        self.produced = Some(self.emit.clone());
        true
    }

    fn get_output(&self, pin: &str) -> Value {
        if pin != "out" {
            return Value::Float(0.0);
        }
        self.produced.clone().unwrap_or_else(|| {
            self.out_type
                .tag()
                .map(Value::zero)
                .unwrap_or(Value::Float(0.0))
        })
    }

    fn shutdown(&mut self) {
        self.probe.shutdown.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pass-through block: copies the staged `in` value to `out` on execute.
pub struct Identity {
    block_id: &'static str,
    pin_type: PinType,
    staged: Option<Value>,
    produced: Option<Value>,
    probe: Arc<Probe>,
}

impl Identity {
    pub fn new(block_id: &'static str, pin_type: PinType, probe: Arc<Probe>) -> Self {
        Self {
            block_id,
            pin_type,
            staged: None,
            produced: None,
            probe,
        }
    }
}

impl Block for Identity {
    fn id(&self) -> &str {
        self.block_id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn kind(&self) -> &str {
        "processing"
    }

    fn input_pins(&self) -> Vec<PinDescriptor> {
        vec![PinDescriptor::input("in", self.pin_type)]
    }

    fn output_pins(&self) -> Vec<PinDescriptor> {
        vec![PinDescriptor::output("out", self.pin_type)]
    }

    fn initialize(&mut self, _config: &BlockConfig) -> bool {
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn set_input(&mut self, pin: &str, value: Value) {
        if pin == "in" {
            self.staged = Some(value);
        }
    }

    fn execute(&mut self) -> bool {
        self.probe.executed.fetch_add(1, Ordering::SeqCst);
        self.produced = self.staged.clone();
        true
    }

    fn get_output(&self, pin: &str) -> Value {
        if pin != "out" {
            return Value::Float(0.0);
        }
        self.produced.clone().unwrap_or_else(|| {
            self.pin_type
                .tag()
                .map(Value::zero)
                .unwrap_or(Value::Float(0.0))
        })
    }

    fn shutdown(&mut self) {
        self.probe.shutdown.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pass-through block whose execute fails while the shared flag is set.
pub struct Flaky {
    block_id: &'static str,
    fail: Arc<AtomicBool>,
    staged: Option<Value>,
    produced: Option<Value>,
    probe: Arc<Probe>,
}

impl Flaky {
    pub fn new(block_id: &'static str, fail: Arc<AtomicBool>, probe: Arc<Probe>) -> Self {
        Self {
            block_id,
            fail,
            staged: None,
            produced: None,
            probe,
        }
    }
}

impl Block for Flaky {
    fn id(&self) -> &str {
        self.block_id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn kind(&self) -> &str {
        "processing"
    }

    fn input_pins(&self) -> Vec<PinDescriptor> {
        vec![PinDescriptor::input("in", PinType::Float)]
    }

    fn output_pins(&self) -> Vec<PinDescriptor> {
        vec![PinDescriptor::output("out", PinType::Float)]
    }

    fn initialize(&mut self, _config: &BlockConfig) -> bool {
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn set_input(&mut self, pin: &str, value: Value) {
        if pin == "in" {
            self.staged = Some(value);
        }
    }

    fn execute(&mut self) -> bool {
        self.probe.executed.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.produced = self.staged.clone();
        true
    }

    fn get_output(&self, pin: &str) -> Value {
        if pin != "out" {
            return Value::Float(0.0);
        }
        self.produced.clone().unwrap_or(Value::Float(0.0))
    }

    fn shutdown(&mut self) {
        self.probe.shutdown.fetch_add(1, Ordering::SeqCst);
    }
}

/// Assemble a manifest the way the designer emits them: every block at
/// version 1.0.0, node types carrying the block id as a suffix.
pub fn manifest_from(
    blocks: &[&str],
    nodes: &[(i32, &str)],
    connections: &[(i32, &str, i32, &str)],
) -> cira_runtime::Manifest {
    let blocks: Vec<_> = blocks
        .iter()
        .map(|id| serde_json::json!({"id": id, "version": "1.0.0", "type": "native"}))
        .collect();
    let nodes: Vec<_> = nodes
        .iter()
        .map(|(id, node_type)| serde_json::json!({"id": id, "type": node_type}))
        .collect();
    let connections: Vec<_> = connections
        .iter()
        .map(|(from, from_pin, to, to_pin)| {
            serde_json::json!({
                "from_node_id": from,
                "from_pin": from_pin,
                "to_node_id": to,
                "to_pin": to_pin,
            })
        })
        .collect();

    let doc = serde_json::json!({
        "format_version": "1.0",
        "pipeline_name": "test-pipeline",
        "target_platform": "linux-arm64",
        "blocks": blocks,
        "pipeline": {"nodes": nodes, "connections": connections},
    });
    cira_runtime::Manifest::from_json(&doc.to_string()).expect("valid test manifest")
}

/// Register a float producer under `id` in the registry.
pub fn register_producer(
    registry: &mut BlockRegistry,
    id: &'static str,
    value: f32,
    probe: &Arc<Probe>,
) {
    let probe = probe.clone();
    registry.register(id, "1.0.0", move || {
        Box::new(Producer::float(id, value, probe.clone()))
    });
}

/// Register a float identity block under `id` in the registry.
pub fn register_identity(registry: &mut BlockRegistry, id: &'static str, probe: &Arc<Probe>) {
    let probe = probe.clone();
    registry.register(id, "1.0.0", move || {
        Box::new(Identity::new(id, PinType::Float, probe.clone()))
    });
}
