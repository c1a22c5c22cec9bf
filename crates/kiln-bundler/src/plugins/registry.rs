//! Plugin registry with execution phases.
//!
//! Plugins are kept in registration order and sorted by phase once, when the
//! registry is split into the transform and emit pipelines at build start.

use std::sync::Arc;

use kiln_graph::{SourceTransform, TransformPipeline};

use crate::emit::{EmitHook, EmitPipeline};

/// Plugin execution phases
///
/// Plugins are executed in phase order (lower numbers first). The sort is
/// stable, so plugins sharing a phase keep their registration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginPhase {
    /// Source rewriting before import/export extraction.
    #[default]
    Transform = 20,

    /// Chunk code rewriting right after rendering.
    Render = 50,

    /// Last touches before hashing (banners, license comments).
    PostProcess = 100,
}

/// A registered hook.
#[derive(Clone)]
pub enum Plugin {
    Transform(Arc<dyn SourceTransform>),
    Emit(Arc<dyn EmitHook>),
}

impl Plugin {
    pub fn transform(transform: impl SourceTransform + 'static) -> Self {
        Self::Transform(Arc::new(transform))
    }

    pub fn emit(hook: impl EmitHook + 'static) -> Self {
        Self::Emit(Arc::new(hook))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Transform(transform) => transform.name(),
            Self::Emit(hook) => hook.name(),
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transform(_) => f.debug_tuple("Transform").field(&self.name()).finish(),
            Self::Emit(_) => f.debug_tuple("Emit").field(&self.name()).finish(),
        }
    }
}

/// Plugin registry that maintains plugins in phase order
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, Plugin)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin with an explicit phase
    pub fn add_with_phase(&mut self, plugin: Plugin, phase: PluginPhase) {
        self.plugins.push((phase, plugin));
    }

    /// Split into the transform pipeline and the emit pipeline, each in
    /// phase order.
    pub fn into_pipelines(mut self) -> (TransformPipeline, EmitPipeline) {
        self.plugins.sort_by_key(|(phase, _)| *phase);

        let mut transforms = TransformPipeline::new();
        let mut hooks = EmitPipeline::new();
        for (_, plugin) in self.plugins {
            match plugin {
                Plugin::Transform(transform) => transforms.push(transform),
                Plugin::Emit(hook) => hooks.push(hook),
            }
        }
        (transforms, hooks)
    }

    /// Get the number of plugins in the registry
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
