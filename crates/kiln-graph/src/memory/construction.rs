//! Construction methods for ModuleGraph.

use std::sync::Arc;

use parking_lot::RwLock;

use super::super::Module;
use super::graph::{GraphInner, ModuleGraph};

impl ModuleGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(GraphInner::default())),
        }
    }

    /// Construct a graph from modules, without edges.
    ///
    /// Module order is kept as the discovery order.
    pub fn from_modules<I>(modules: I) -> Self
    where
        I: IntoIterator<Item = Module>,
    {
        let graph = Self::new();
        for module in modules {
            graph.add_module(module);
        }
        graph
    }
}
