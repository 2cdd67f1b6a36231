//! Stable ABI between the runtime and block plug-ins.
//!
//! Every block library exports exactly two C-linkage symbols: a factory
//! returning a raw block pointer and the paired destructor. The pointers
//! are Rust trait objects, so both sides must be built against this crate;
//! the runtime guarantees the library outlives every instance it created.

use super::block::Block;

/// Name of the exported factory symbol.
pub const CREATE_BLOCK_SYMBOL: &[u8] = b"create_block";

/// Name of the exported destructor symbol.
pub const DESTROY_BLOCK_SYMBOL: &[u8] = b"destroy_block";

/// `create_block() -> *Block`. A null return signals allocation failure.
pub type CreateBlockFn = unsafe extern "C" fn() -> *mut dyn Block;

/// `destroy_block(*Block)`. Must only receive pointers produced by the
/// matching `create_block`.
pub type DestroyBlockFn = unsafe extern "C" fn(*mut dyn Block);

/// Generate the exported factory pair for a block crate.
///
/// ```ignore
/// struct Bme280Block { /* ... */ }
/// impl Block for Bme280Block { /* ... */ }
///
/// cira_runtime::declare_block!(Bme280Block::new());
/// ```
#[macro_export]
macro_rules! declare_block {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn create_block() -> *mut dyn $crate::core::Block {
            let block: Box<dyn $crate::core::Block> = Box::new($ctor);
            Box::into_raw(block)
        }

        /// # Safety
        /// `block` must come from the `create_block` above and not have
        /// been destroyed already.
        #[no_mangle]
        pub unsafe extern "C" fn destroy_block(block: *mut dyn $crate::core::Block) {
            if !block.is_null() {
                drop(Box::from_raw(block));
            }
        }
    };
}
