//! Mutation methods for ModuleGraph.

use std::sync::Arc;

use super::super::{Liveness, Module, ModuleId};
use super::graph::{GraphInner, ModuleGraph};
use crate::error::{GraphError, Result};
use crate::usage::UsageReport;

impl ModuleGraph {
    /// Add a module into the graph, replacing any module with the same id.
    pub fn add_module(&self, module: Module) {
        let mut inner = self.inner.write();
        let id = module.id.clone();
        if inner.modules.insert(id.clone(), Arc::new(module)).is_none() {
            inner.order.push(id);
        }
    }

    /// Add an eager edge. Both endpoints must already be in the graph.
    pub fn add_static_edge(&self, from: ModuleId, to: ModuleId) -> Result<()> {
        let mut inner = self.inner.write();
        check_endpoints(&inner, &from, &to)?;
        inner
            .static_deps
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        inner.dependents.entry(to).or_default().insert(from);
        Ok(())
    }

    /// Add a lazy edge (chunk boundary). Both endpoints must already be in
    /// the graph.
    pub fn add_dynamic_edge(&self, from: ModuleId, to: ModuleId) -> Result<()> {
        let mut inner = self.inner.write();
        check_endpoints(&inner, &from, &to)?;
        inner
            .dynamic_deps
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        inner.dependents.entry(to).or_default().insert(from);
        Ok(())
    }

    /// Append a module to a named entry and mark it as an entry module.
    pub fn add_entry_point(&self, name: impl Into<String>, id: ModuleId) -> Result<()> {
        let name = name.into();
        let mut inner = self.inner.write();

        let Some(module_arc) = inner.modules.get(&id) else {
            return Err(GraphError::DanglingEntry { entry: name, module: id });
        };
        if !module_arc.is_entry {
            let mut module = (**module_arc).clone();
            module.mark_entry();
            inner.modules.insert(id.clone(), Arc::new(module));
        }

        let modules = inner.entry_points.entry(name).or_default();
        if !modules.contains(&id) {
            modules.push(id);
        }
        Ok(())
    }

    /// Write the analyzer's verdict onto every export: `Live` or `Dead`.
    pub fn apply_usage(&self, report: &UsageReport) {
        let mut inner = self.inner.write();
        for (id, module_arc) in inner.modules.iter_mut() {
            let module = Arc::make_mut(module_arc);
            for export in module.exports_mut().iter_mut() {
                let liveness = if report.is_live(id, &export.name) {
                    Liveness::Live
                } else {
                    Liveness::Dead
                };
                export.set_liveness(liveness);
            }
        }
        tracing::debug!(
            live = report.live_export_count(),
            retained = report.retained_count(),
            "applied export liveness"
        );
    }
}

fn check_endpoints(inner: &GraphInner, from: &ModuleId, to: &ModuleId) -> Result<()> {
    if inner.modules.contains_key(from) && inner.modules.contains_key(to) {
        Ok(())
    } else {
        Err(GraphError::DanglingEdge {
            from: from.clone(),
            to: to.clone(),
        })
    }
}
