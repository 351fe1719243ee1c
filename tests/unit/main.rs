//! Unit-level tests against the public library API.

mod config_tests;
mod graph_tests;
mod validation_tests;
