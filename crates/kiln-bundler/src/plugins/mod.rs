//! Build extension points.
//!
//! Plugins are typed hooks, not string-keyed lookups: a
//! [`SourceTransform`](kiln_graph::SourceTransform) rewrites module source
//! before parsing and an [`EmitHook`](crate::EmitHook) rewrites rendered
//! chunk code before hashing.

mod registry;

pub use registry::{Plugin, PluginPhase, PluginRegistry};
