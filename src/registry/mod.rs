//! In-process block provider.
//!
//! Targets that link blocks statically (and the test suite) register
//! factories here instead of loading libraries. The registry preserves the
//! loader's sharing semantics: one instance per (id, version), handed out
//! by reference to every node that selects it.

use crate::core::Block;
use crate::loader::{BlockHandle, BlockKey, BlockProvider, LoadError, SharedBlock};
use std::collections::HashMap;
use std::sync::RwLock;

/// Factory producing a fresh block instance.
pub type BlockFactory = Box<dyn Fn() -> Box<dyn Block> + Send + Sync>;

pub struct BlockRegistry {
    factories: HashMap<BlockKey, BlockFactory>,
    cache: RwLock<HashMap<BlockKey, BlockHandle>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<F>(&mut self, id: &str, version: &str, factory: F)
    where
        F: Fn() -> Box<dyn Block> + Send + Sync + 'static,
    {
        self.factories
            .insert(BlockKey::new(id, version), Box::new(factory));
    }

    pub fn registered(&self) -> Vec<BlockKey> {
        self.factories.keys().cloned().collect()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockProvider for BlockRegistry {
    fn is_available(&self, id: &str, version: &str) -> bool {
        self.factories
            .contains_key(&BlockKey::new(id, version))
    }

    fn acquire(&self, id: &str, version: &str) -> Result<BlockHandle, LoadError> {
        let key = BlockKey::new(id, version);

        if let Some(handle) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(handle.clone());
        }

        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| LoadError::Unregistered { key: key.clone() })?;
        let handle = SharedBlock::native(key.clone(), factory());

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let entry = cache.entry(key).or_insert(handle);
        Ok(entry.clone())
    }
}
