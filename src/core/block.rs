use super::value::{PinType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Block configuration from the manifest. Values are always strings; the
/// manifest parser serializes non-string JSON to its minified text form and
/// the block performs any further parsing.
pub type BlockConfig = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    Input,
    Output,
}

/// A named, typed port on a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub pin_type: PinType,
    pub direction: PinDirection,
}

impl PinDescriptor {
    pub fn input(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            direction: PinDirection::Input,
        }
    }

    pub fn output(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            direction: PinDirection::Output,
        }
    }
}

/// Contract every block exposes to the runtime.
///
/// This trait crosses the plug-in boundary: implementations live in
/// independently compiled libraries exporting the factory pair from
/// [`crate::core::abi`]. Failure is encoded in the `bool` returns; a block
/// must never panic across the boundary.
pub trait Block: Send {
    /// Stable block identifier, e.g. "adxl345-sensor". Pure and cheap.
    fn id(&self) -> &str;

    /// Semantic version string, e.g. "1.0.0".
    fn version(&self) -> &str;

    /// Block category, e.g. "sensor", "processing", "model", "output".
    fn kind(&self) -> &str;

    /// Declared input pins. Stable once `initialize` has returned.
    fn input_pins(&self) -> Vec<PinDescriptor>;

    /// Declared output pins. Stable once `initialize` has returned.
    fn output_pins(&self) -> Vec<PinDescriptor>;

    /// Configure the block. The runtime calls this at most once per
    /// instance, before the first tick. `false` signals a failed setup
    /// (missing hardware, bad config); the node is retained and will
    /// likely produce zeros.
    fn initialize(&mut self, config: &BlockConfig) -> bool;

    /// Stage an input value before `execute`. Unknown pins and type
    /// mismatches are silently ignored; the scheduler performs declared
    /// coercion before calling this.
    fn set_input(&mut self, pin: &str, value: Value);

    /// Perform one computation step over the staged inputs. `false`
    /// signals a recoverable error; the scheduler keeps the previous
    /// outputs visible downstream.
    fn execute(&mut self) -> bool;

    /// Value produced on `pin` by the most recent successful `execute`,
    /// or the type's zero if there has been none.
    fn get_output(&self, pin: &str) -> Value;

    /// Release resources. Must be safe to call even when `initialize` was
    /// never called or failed.
    fn shutdown(&mut self);
}
