//! In-memory ModuleGraph implementation.
//!
//! Storage lives in `graph.rs`; the other files add impl blocks to
//! [`ModuleGraph`] grouped by concern.

mod chains;
mod construction;
mod graph;
mod mutations;
mod queries;

pub use graph::ModuleGraph;
