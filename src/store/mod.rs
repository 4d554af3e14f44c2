//! Object store boundary.
//!
//! The allocator consumes a transactional store with commit-ordered change
//! events. [`MemoryStore`] is the built-in implementation; the engine's only
//! demands on it are the `update`/`view`/`subscribe` surface exposed here.

mod memory;

pub use memory::{MemoryStore, ReadView, WriteTx};
