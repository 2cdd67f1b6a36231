pub mod abi;
pub mod block;
pub mod value;

pub use abi::{CreateBlockFn, DestroyBlockFn, CREATE_BLOCK_SYMBOL, DESTROY_BLOCK_SYMBOL};
pub use block::{Block, BlockConfig, PinDescriptor, PinDirection};
pub use value::{PinType, TypeError, Value, ValueTag};
