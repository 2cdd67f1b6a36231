use super::model::Manifest;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

impl Manifest {
    /// Parse a manifest from its JSON text.
    ///
    /// Missing optional fields yield empty collections; a missing required
    /// field on an item fails the whole parse with a diagnostic naming the
    /// field and location. Unknown fields are ignored.
    pub fn from_json(text: &str) -> Result<Manifest> {
        let manifest: Manifest =
            serde_json::from_str(text).context("invalid pipeline manifest")?;
        Ok(manifest)
    }

    /// Load and parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest file: {}", path.display()))?;
        let manifest = Manifest::from_json(&text)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

        info!(
            pipeline = %manifest.pipeline_name,
            platform = %manifest.target_platform,
            blocks = manifest.blocks.len(),
            nodes = manifest.nodes().len(),
            connections = manifest.connections().len(),
            "manifest loaded"
        );

        Ok(manifest)
    }
}
