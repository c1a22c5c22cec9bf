//! Reachability and cycle analysis over static edges.

use std::collections::VecDeque;

use indexmap::IndexSet;
use rustc_hash::FxHashMap as HashMap;

use super::super::ModuleId;
use super::graph::{GraphInner, ModuleGraph};

impl ModuleGraph {
    /// Modules reachable from `roots` through static edges, roots included,
    /// in breadth-first order.
    pub fn static_closure<'a, I>(&self, roots: I) -> IndexSet<ModuleId>
    where
        I: IntoIterator<Item = &'a ModuleId>,
    {
        let inner = self.inner.read();
        let mut seen: IndexSet<ModuleId> = IndexSet::new();
        let mut queue: VecDeque<ModuleId> = VecDeque::new();

        for root in roots {
            if inner.modules.contains_key(root) && seen.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(deps) = inner.static_deps.get(&current) {
                for dep in deps {
                    if seen.insert(dep.clone()) {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }

        seen
    }

    /// Strongly connected components of the static subgraph that form a
    /// cycle (more than one module, or a self import).
    ///
    /// Components and their members are in discovery order.
    pub fn find_static_cycles(&self) -> Vec<Vec<ModuleId>> {
        let inner = self.inner.read();
        let mut tarjan = Tarjan::new(&inner);
        for id in &inner.order {
            if !tarjan.index.contains_key(id) {
                tarjan.connect(id);
            }
        }

        let position: HashMap<&ModuleId, usize> =
            inner.order.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let mut cycles: Vec<Vec<ModuleId>> = tarjan
            .components
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || inner
                        .static_deps
                        .get(&component[0])
                        .is_some_and(|deps| deps.contains(&component[0]))
            })
            .map(|mut component| {
                component.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
                component
            })
            .collect();
        cycles.sort_by_key(|component| position.get(&component[0]).copied().unwrap_or(usize::MAX));
        cycles
    }
}

struct Tarjan<'g> {
    inner: &'g GraphInner,
    next: usize,
    index: HashMap<ModuleId, usize>,
    lowlink: HashMap<ModuleId, usize>,
    stack: Vec<ModuleId>,
    on_stack: IndexSet<ModuleId>,
    components: Vec<Vec<ModuleId>>,
}

impl<'g> Tarjan<'g> {
    fn new(inner: &'g GraphInner) -> Self {
        Self {
            inner,
            next: 0,
            index: HashMap::default(),
            lowlink: HashMap::default(),
            stack: Vec::new(),
            on_stack: IndexSet::new(),
            components: Vec::new(),
        }
    }

    fn connect(&mut self, id: &ModuleId) {
        self.index.insert(id.clone(), self.next);
        self.lowlink.insert(id.clone(), self.next);
        self.next += 1;
        self.stack.push(id.clone());
        self.on_stack.insert(id.clone());

        let deps: Vec<ModuleId> = self
            .inner
            .static_deps
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();

        for dep in deps {
            if !self.index.contains_key(&dep) {
                self.connect(&dep);
                let low = self.lowlink[&dep].min(self.lowlink[id]);
                self.lowlink.insert(id.clone(), low);
            } else if self.on_stack.contains(&dep) {
                let low = self.index[&dep].min(self.lowlink[id]);
                self.lowlink.insert(id.clone(), low);
            }
        }

        if self.lowlink[id] == self.index[id] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.swap_remove(&member);
                let done = &member == id;
                component.push(member);
                if done {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
