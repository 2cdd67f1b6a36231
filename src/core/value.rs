use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How many array elements the display form keeps before truncating.
const DISPLAY_ARRAY_LIMIT: usize = 16;

/// Tagged value carried on pins between blocks.
///
/// Values are immutable snapshots; transfer from an output pin to an input
/// pin is by copy. The set is deliberately small because it crosses the
/// plug-in boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// Scalar integer
    Int(i32),

    /// Boolean
    Bool(bool),

    /// Text / string
    Text(String),

    /// Variable-length float vector (also carries vector3 payloads)
    Array(Vec<f32>),
}

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    Float,
    Int,
    Bool,
    Text,
    Array,
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueTag::Float => "float",
            ValueTag::Int => "int",
            ValueTag::Bool => "bool",
            ValueTag::Text => "string",
            ValueTag::Array => "array",
        };
        f.write_str(name)
    }
}

/// Coercion failure between value tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot coerce {from} to {to}")]
pub struct TypeError {
    pub from: ValueTag,
    pub to: ValueTag,
}

impl Value {
    /// Return the tag of this value. Constant time.
    #[inline]
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Float(_) => ValueTag::Float,
            Value::Int(_) => ValueTag::Int,
            Value::Bool(_) => ValueTag::Bool,
            Value::Text(_) => ValueTag::Text,
            Value::Array(_) => ValueTag::Array,
        }
    }

    /// The zero value for a tag: what `get_output` reports before the first
    /// successful execute.
    pub fn zero(tag: ValueTag) -> Value {
        match tag {
            ValueTag::Float => Value::Float(0.0),
            ValueTag::Int => Value::Int(0),
            ValueTag::Bool => Value::Bool(false),
            ValueTag::Text => Value::Text(String::new()),
            ValueTag::Array => Value::Array(Vec::new()),
        }
    }

    /// Coerce into `target`.
    ///
    /// Succeeds for the identity and for the allowed pairs
    /// Int->Float, Bool->Int, Bool->Float, Float->Bool (non-zero is true).
    /// Arrays never coerce to or from scalars.
    pub fn coerce(&self, target: ValueTag) -> Result<Value, TypeError> {
        if self.tag() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (Value::Int(i), ValueTag::Float) => Ok(Value::Float(*i as f32)),
            (Value::Bool(b), ValueTag::Int) => Ok(Value::Int(*b as i32)),
            (Value::Bool(b), ValueTag::Float) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Float(f), ValueTag::Bool) => Ok(Value::Bool(*f != 0.0)),
            _ => Err(TypeError {
                from: self.tag(),
                to: target,
            }),
        }
    }

    /// Canonical, locale-independent display form used by metrics snapshots.
    ///
    /// Floats render with at most six decimal digits, trailing zeros
    /// trimmed; arrays truncate at 16 elements.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Float(f) => format_float(*f),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
            Value::Array(values) => {
                let mut out = String::from("[");
                for (i, v) in values.iter().take(DISPLAY_ARRAY_LIMIT).enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&format_float(*v));
                }
                if values.len() > DISPLAY_ARRAY_LIMIT {
                    out.push_str(", ...");
                }
                out.push(']');
                out
            }
        }
    }
}

fn format_float(v: f32) -> String {
    let mut s = format!("{v:.6}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// Declared type of a pin: the value tags plus the symbolic aliases
/// `vector3` (a length-three array on the wire) and `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Float,
    Int,
    Bool,
    #[serde(rename = "string")]
    Text,
    Array,
    Vector3,
    Any,
}

impl PinType {
    /// The value tag a pin of this type carries, or `None` for `any`.
    pub fn tag(self) -> Option<ValueTag> {
        match self {
            PinType::Float => Some(ValueTag::Float),
            PinType::Int => Some(ValueTag::Int),
            PinType::Bool => Some(ValueTag::Bool),
            PinType::Text => Some(ValueTag::Text),
            PinType::Array | PinType::Vector3 => Some(ValueTag::Array),
            PinType::Any => None,
        }
    }

    pub fn parse(name: &str) -> Option<PinType> {
        match name {
            "float" => Some(PinType::Float),
            "int" => Some(PinType::Int),
            "bool" => Some(PinType::Bool),
            "string" => Some(PinType::Text),
            "array" => Some(PinType::Array),
            "vector3" => Some(PinType::Vector3),
            "any" => Some(PinType::Any),
            _ => None,
        }
    }

    /// Whether a wire from an output of type `self` may feed an input of
    /// type `to`: same tag, either side `any`, or an allowed coercion pair.
    pub fn connects_to(self, to: PinType) -> bool {
        let (from_tag, to_tag) = match (self.tag(), to.tag()) {
            (Some(f), Some(t)) => (f, t),
            // `any` on either side accepts everything.
            _ => return true,
        };
        if from_tag == to_tag {
            return true;
        }
        matches!(
            (from_tag, to_tag),
            (ValueTag::Int, ValueTag::Float)
                | (ValueTag::Bool, ValueTag::Int)
                | (ValueTag::Bool, ValueTag::Float)
                | (ValueTag::Float, ValueTag::Bool)
        )
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinType::Float => "float",
            PinType::Int => "int",
            PinType::Bool => "bool",
            PinType::Text => "string",
            PinType::Array => "array",
            PinType::Vector3 => "vector3",
            PinType::Any => "any",
        };
        f.write_str(name)
    }
}
