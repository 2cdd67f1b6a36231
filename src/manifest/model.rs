use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A block the pipeline depends on, as declared in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReference {
    /// Block identifier, e.g. "adxl345-sensor".
    pub id: String,
    /// Semantic version, e.g. "1.0.0".
    pub version: String,
    /// Implementation tag, e.g. "i2c-device", "native", "onnx-runtime".
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Designer canvas position of a node. Purely cosmetic for the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// One node of the pipeline: an instance of a block with its own config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: i32,
    /// Dotted type string, e.g. "input.accelerometer.adxl345".
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default, deserialize_with = "deserialize_config")]
    pub config: HashMap<String, String>,
}

/// A directed wire from an output pin to an input pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node_id: i32,
    pub from_pin: String,
    pub to_node_id: i32,
    pub to_pin: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default)]
    pub nodes: Vec<NodeInstance>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Parsed pipeline manifest. Read-only after startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub pipeline_name: String,
    #[serde(default)]
    pub target_platform: String,
    #[serde(default)]
    pub blocks: Vec<BlockReference>,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl Manifest {
    pub fn nodes(&self) -> &[NodeInstance] {
        &self.pipeline.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.pipeline.connections
    }

    /// The declared reference for `block_id`, if any.
    pub fn block_reference(&self, block_id: &str) -> Option<&BlockReference> {
        self.blocks.iter().find(|b| b.id == block_id)
    }
}

/// Config values keep their string form; non-string JSON is stored as its
/// minified serialization and the block parses it further.
fn deserialize_config<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, serde_json::Value> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}
