//! Filesystem implementations.
//!
//! [`sfs`] holds the memory-backed filesystem core: image layout,
//! allocator, pointer-tree walk, directory layer and the path-level
//! operations built on top of them.

pub mod sfs;
