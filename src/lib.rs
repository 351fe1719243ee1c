//! skillctl - catalog tooling for agent skill packages.
//!
//! Validates skill directories against naming and token-budget rules, orders
//! package files with a dependency graph, installs packages atomically into
//! user or project targets, and mirrors external skills from upstream sources
//! without ever touching locally authored ones.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod install;
pub mod storage;
pub mod sync;
pub mod utils;

pub mod test_utils;

pub use error::{CtlError, Result};
