//! Storage layer for skillctl
//!
//! A single JSON index guarded by an advisory lock, plus the cache
//! directory that holds mirrored external packages.

pub mod lock;
pub mod registry;

pub use lock::{LockInfo, RegistryLock};
pub use registry::{RegistryEntry, RegistryIndex, RegistryStore};
