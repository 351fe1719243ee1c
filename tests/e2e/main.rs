//! E2E test suite entry point.

#[path = "../common/mod.rs"]
mod common;
mod catalog_workflow;
mod install_workflow;
mod sync_workflow;
