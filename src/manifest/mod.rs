pub mod model;
pub mod parser;

pub use model::{BlockReference, Connection, Manifest, NodeInstance, PipelineSection, Position};
