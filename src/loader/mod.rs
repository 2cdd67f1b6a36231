//! Dynamic block loading.
//!
//! Maps a (block id, version) pair to a live, shared block instance backed
//! by a plug-in library in the block directory. A given pair is opened at
//! most once per process; every caller gets the same instance by reference.

use crate::core::abi::{
    CreateBlockFn, DestroyBlockFn, CREATE_BLOCK_SYMBOL, DESTROY_BLOCK_SYMBOL,
};
use crate::core::Block;
use libloading::Library;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Default plug-in directory on the device image.
pub const DEFAULT_BLOCK_PATH: &str = "/usr/local/lib/cira/blocks/";

#[cfg(windows)]
pub const PLATFORM_EXT: &str = "dll";
#[cfg(not(windows))]
pub const PLATFORM_EXT: &str = "so";

/// Identity of a block plug-in: id plus semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub id: String,
    pub version: String,
}

impl BlockKey {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id, self.version)
    }
}

/// Why a block failed to load, with the stage that failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open block library {}: {source}", .path.display())]
    LibraryOpen {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("block library is missing symbol `{name}`: {source}")]
    SymbolMissing {
        name: &'static str,
        source: libloading::Error,
    },

    #[error("create_block returned null for {key}")]
    InstanceCreation { key: BlockKey },

    #[error("no block registered for {key}")]
    Unregistered { key: BlockKey },
}

/// A block instance shared between every node that selected its key.
///
/// The wrapper owns the library handle and guarantees it outlives the
/// instance: the destructor from the library runs before the library
/// itself is closed.
pub struct SharedBlock {
    key: BlockKey,
    cell: Mutex<BlockCell>,
}

impl std::fmt::Debug for SharedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBlock").field("key", &self.key).finish()
    }
}

/// Handle to a shared block instance. Cloning is by reference.
pub type BlockHandle = Arc<SharedBlock>;

enum BlockCell {
    /// In-process block from a registry factory.
    Native(Box<dyn Block>),
    /// Instance created by a plug-in library.
    Plugin(PluginBlock),
}

struct PluginBlock {
    instance: *mut dyn Block,
    destroy: DestroyBlockFn,
    // Dropped after the destructor above has run.
    _library: Arc<Library>,
}

// The raw instance is only reachable through the SharedBlock mutex, and the
// contract requires plug-in blocks to be Send.
unsafe impl Send for PluginBlock {}

impl Drop for PluginBlock {
    fn drop(&mut self) {
        unsafe { (self.destroy)(self.instance) };
    }
}

impl SharedBlock {
    pub(crate) fn native(key: BlockKey, block: Box<dyn Block>) -> BlockHandle {
        Arc::new(Self {
            key,
            cell: Mutex::new(BlockCell::Native(block)),
        })
    }

    fn plugin(key: BlockKey, plugin: PluginBlock) -> BlockHandle {
        Arc::new(Self {
            key,
            cell: Mutex::new(BlockCell::Plugin(plugin)),
        })
    }

    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    /// Run `f` with exclusive access to the block instance.
    ///
    /// The lock is held only for the duration of `f`; callers must not
    /// re-enter `with` from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Block) -> R) -> R {
        let mut cell = self.cell.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *cell {
            BlockCell::Native(block) => f(block.as_mut()),
            BlockCell::Plugin(plugin) => f(unsafe { &mut *plugin.instance }),
        }
    }
}

/// Source of block instances for the graph builder: the filesystem loader
/// or an in-process registry.
pub trait BlockProvider {
    /// Whether the block can be acquired without attempting a full load.
    fn is_available(&self, id: &str, version: &str) -> bool;

    /// Acquire the shared instance for (id, version), loading it on first
    /// request.
    fn acquire(&self, id: &str, version: &str) -> Result<BlockHandle, LoadError>;
}

/// Loads block plug-ins from a directory of `<id>-v<version>.<ext>` files,
/// caching one instance per key.
pub struct BlockLoader {
    block_path: PathBuf,
    cache: RwLock<HashMap<BlockKey, BlockHandle>>,
}

impl BlockLoader {
    pub fn new(block_path: impl Into<PathBuf>) -> Self {
        Self {
            block_path: block_path.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn block_path(&self) -> &Path {
        &self.block_path
    }

    /// Filesystem path a block library is expected at.
    pub fn library_path(&self, id: &str, version: &str) -> PathBuf {
        self.block_path
            .join(format!("{id}-v{version}.{PLATFORM_EXT}"))
    }

    /// Load the block, or return the already cached instance unchanged.
    pub fn load(&self, id: &str, version: &str) -> Result<BlockHandle, LoadError> {
        let key = BlockKey::new(id, version);

        if let Some(handle) = self.cached(&key) {
            debug!(block = %key, "block already loaded, reusing instance");
            return Ok(handle);
        }

        let path = self.library_path(id, version);
        info!(block = %key, path = %path.display(), "loading block library");

        // Library::new resolves lazily (RTLD_LAZY on unix-likes).
        let library = unsafe { Library::new(&path) }.map_err(|source| LoadError::LibraryOpen {
            path: path.clone(),
            source,
        })?;

        let create: CreateBlockFn = unsafe {
            *library
                .get::<CreateBlockFn>(CREATE_BLOCK_SYMBOL)
                .map_err(|source| LoadError::SymbolMissing {
                    name: "create_block",
                    source,
                })?
        };
        let destroy: DestroyBlockFn = unsafe {
            *library
                .get::<DestroyBlockFn>(DESTROY_BLOCK_SYMBOL)
                .map_err(|source| LoadError::SymbolMissing {
                    name: "destroy_block",
                    source,
                })?
        };

        let instance = unsafe { create() };
        if instance.is_null() {
            return Err(LoadError::InstanceCreation { key });
        }

        let handle = SharedBlock::plugin(
            key.clone(),
            PluginBlock {
                instance,
                destroy,
                _library: Arc::new(library),
            },
        );

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // A racing load of the same key keeps the first inserted instance.
        let entry = cache.entry(key).or_insert_with(|| handle.clone());
        Ok(entry.clone())
    }

    /// Whether the library file for (id, version) exists.
    pub fn is_block_available(&self, id: &str, version: &str) -> bool {
        self.library_path(id, version).is_file()
    }

    /// Drop the cached instance for one key. The block is destroyed and
    /// its library closed once the last outstanding handle is gone.
    pub fn unload(&self, id: &str, version: &str) {
        let key = BlockKey::new(id, version);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.remove(&key).is_some() {
            debug!(block = %key, "block unloaded");
        }
    }

    /// Drop every cached instance.
    pub fn unload_all(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let count = cache.len();
        cache.clear();
        debug!(count, "all blocks unloaded");
    }

    /// Number of cached block instances.
    pub fn loaded_count(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn cached(&self, key: &BlockKey) -> Option<BlockHandle> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

impl Default for BlockLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_PATH)
    }
}

impl BlockProvider for BlockLoader {
    fn is_available(&self, id: &str, version: &str) -> bool {
        self.is_block_available(id, version)
    }

    fn acquire(&self, id: &str, version: &str) -> Result<BlockHandle, LoadError> {
        self.load(id, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_display() {
        let key = BlockKey::new("adxl345-sensor", "1.0.0");
        assert_eq!(key.to_string(), "adxl345-sensor-1.0.0");
    }

    #[test]
    fn test_library_path_format() {
        let loader = BlockLoader::new("/opt/blocks");
        let path = loader.library_path("bme280-sensor", "2.1.0");
        assert_eq!(
            path,
            PathBuf::from(format!("/opt/blocks/bme280-sensor-v2.1.0.{PLATFORM_EXT}"))
        );
    }
}
