//! Property tests for graph ordering.

mod graph_properties;
