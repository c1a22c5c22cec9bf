use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;

use super::super::{Module, ModuleId};

/// Module dependency graph.
///
/// Cloning is cheap and clones share storage. One build owns one graph; the
/// usage analyzer's liveness write is the only mutation after construction.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    pub(super) inner: Arc<RwLock<GraphInner>>,
}

#[derive(Debug, Default)]
pub(super) struct GraphInner {
    pub modules: HashMap<ModuleId, Arc<Module>>,
    /// Insertion order, which the builder makes the discovery order.
    pub order: Vec<ModuleId>,
    /// Outgoing static edges in source order.
    pub static_deps: HashMap<ModuleId, IndexSet<ModuleId>>,
    /// Outgoing dynamic edges in source order.
    pub dynamic_deps: HashMap<ModuleId, IndexSet<ModuleId>>,
    /// Importers of each module, either edge kind.
    pub dependents: HashMap<ModuleId, IndexSet<ModuleId>>,
    /// Named entries in declaration order.
    pub entry_points: IndexMap<String, Vec<ModuleId>>,
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}
