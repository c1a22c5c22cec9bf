//! Export usage analysis (tree-shaking).
//!
//! Liveness flows backwards along static imports from the roots: entry
//! modules and every dynamic-import target. A dynamic target is its own root
//! because whether it loads is decided at runtime, so nothing crosses a
//! dynamic edge.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use kiln_config::TreeShakingMode;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{ImportKind, Module, ModuleGraph, ModuleId};

/// Name recorded when demand was forwarded through `export *`.
const STAR: &str = "*";

/// Result of one analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsageReport {
    mode: TreeShakingMode,
    live: FxHashMap<ModuleId, BTreeSet<String>>,
    included: FxHashSet<ModuleId>,
}

impl UsageReport {
    pub fn mode(&self) -> TreeShakingMode {
        self.mode
    }

    /// Whether the module's code is emitted.
    pub fn retained(&self, id: &ModuleId) -> bool {
        self.included.contains(id)
    }

    pub fn is_live(&self, id: &ModuleId, export: &str) -> bool {
        self.live.get(id).is_some_and(|names| names.contains(export))
    }

    /// Live export names of a module, sorted.
    pub fn live_exports(&self, id: &ModuleId) -> Vec<&str> {
        self.live
            .get(id)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn retained_count(&self) -> usize {
        self.included.len()
    }

    pub fn live_export_count(&self) -> usize {
        self.live.values().map(BTreeSet::len).sum()
    }
}

/// Computes live exports and retained modules for a graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageAnalyzer {
    mode: TreeShakingMode,
}

enum Work {
    Include(ModuleId),
    Demand(ModuleId, String),
    DemandAll(ModuleId),
}

impl UsageAnalyzer {
    pub fn new(mode: TreeShakingMode) -> Self {
        Self { mode }
    }

    /// Analyze the graph. Reads imports and exports only, never previous
    /// liveness, so repeated runs agree.
    pub fn analyze(&self, graph: &ModuleGraph) -> UsageReport {
        let modules: FxHashMap<ModuleId, Arc<Module>> = graph
            .modules()
            .into_iter()
            .map(|module| (module.id.clone(), module))
            .collect();

        let mut pass = Pass {
            modules: &modules,
            report: UsageReport {
                mode: self.mode,
                ..UsageReport::default()
            },
            all_live: FxHashSet::default(),
            queue: VecDeque::new(),
        };

        for root in graph.entry_modules().into_iter().chain(graph.dynamic_targets()) {
            pass.queue.push_back(Work::DemandAll(root.clone()));
            pass.queue.push_back(Work::Include(root));
        }

        if self.mode == TreeShakingMode::Conservative {
            for module in graph.modules() {
                if module.has_side_effects {
                    pass.queue.push_back(Work::Include(module.id.clone()));
                }
            }
        }

        pass.run();

        tracing::debug!(
            mode = %self.mode,
            retained = pass.report.retained_count(),
            modules = modules.len(),
            "usage analysis complete"
        );
        pass.report
    }
}

struct Pass<'m> {
    modules: &'m FxHashMap<ModuleId, Arc<Module>>,
    report: UsageReport,
    all_live: FxHashSet<ModuleId>,
    queue: VecDeque<Work>,
}

impl Pass<'_> {
    fn run(&mut self) {
        while let Some(work) = self.queue.pop_front() {
            match work {
                Work::Include(id) => self.include(id),
                Work::Demand(id, name) => self.demand(id, name),
                Work::DemandAll(id) => self.demand_all(id),
            }
        }
    }

    fn include(&mut self, id: ModuleId) {
        if !self.report.included.insert(id.clone()) {
            return;
        }
        let modules = self.modules;
        let Some(module) = modules.get(&id) else {
            return;
        };

        for import in module.imports_iter() {
            let Some(target) = import.resolved_to.clone() else {
                continue;
            };
            match import.kind {
                ImportKind::Require => self.queue.push_back(Work::DemandAll(target)),
                ImportKind::Static if import.is_namespace_import() => {
                    self.queue.push_back(Work::DemandAll(target));
                }
                ImportKind::Static => {
                    for name in import.consumed_names() {
                        self.queue
                            .push_back(Work::Demand(target.clone(), name.to_string()));
                    }
                }
                ImportKind::Dynamic
                | ImportKind::Include
                | ImportKind::ReExport
                | ImportKind::TypeOnly => {}
            }
        }
    }

    fn mark(&mut self, id: &ModuleId, name: &str) -> bool {
        self.report
            .live
            .entry(id.clone())
            .or_default()
            .insert(name.to_string())
    }

    fn demand(&mut self, id: ModuleId, name: String) {
        if self.all_live.contains(&id) || !self.mark(&id, &name) {
            return;
        }
        let modules = self.modules;
        let Some(module) = modules.get(&id) else {
            return;
        };
        self.queue.push_back(Work::Include(id.clone()));

        match module.export(&name) {
            Some(export) if export.is_re_export() => self.forward(module, export),
            Some(_) => {}
            None if name != "default" => {
                let targets: Vec<ModuleId> =
                    module.star_export_targets().into_iter().cloned().collect();
                if !targets.is_empty() {
                    self.mark(&id, STAR);
                }
                for target in targets {
                    self.queue.push_back(Work::Demand(target, name.clone()));
                }
            }
            None => {}
        }
    }

    fn demand_all(&mut self, id: ModuleId) {
        if !self.all_live.insert(id.clone()) {
            return;
        }
        let modules = self.modules;
        let Some(module) = modules.get(&id) else {
            return;
        };
        self.queue.push_back(Work::Include(id.clone()));

        for export in module.exports_iter() {
            self.mark(&id, &export.name);
            if export.is_star_re_export() {
                if let Some(target) = export
                    .source
                    .as_deref()
                    .and_then(|source| module.resolved_re_export(source))
                {
                    self.queue.push_back(Work::DemandAll(target.clone()));
                }
            } else if export.is_re_export() {
                self.forward(module, export);
            }
        }
    }

    /// Pass demand for a re-exported binding on to the module it comes from.
    fn forward(&mut self, module: &Module, export: &crate::Export) {
        let Some(target) = export
            .source
            .as_deref()
            .and_then(|source| module.resolved_re_export(source))
            .cloned()
        else {
            return;
        };
        match export.local.as_deref() {
            Some(STAR) => self.queue.push_back(Work::DemandAll(target)),
            Some(imported) => self
                .queue
                .push_back(Work::Demand(target, imported.to_string())),
            None => self
                .queue
                .push_back(Work::Demand(target, export.name.clone())),
        }
    }
}
