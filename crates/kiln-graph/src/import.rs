use serde::{Deserialize, Serialize};

use super::{ModuleId, SourceSpan};

/// Individual import binding from a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportSpecifier {
    /// `import { foo } from 'mod'`
    Named(String),
    /// `import foo from 'mod'`
    Default,
    /// `import * as foo from 'mod'`
    Namespace(String),
}

/// Mechanism used to load the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// Static `import` declaration.
    Static,
    /// `import()` expression or a `require.ensure` dependency. Introduces a
    /// chunk boundary.
    Dynamic,
    /// CommonJS `require()` call.
    Require,
    /// `require.include()`: placed in the importer's chunk, binds nothing.
    Include,
    /// `export { foo } from 'mod'` style re-export.
    ReExport,
    /// TypeScript `import type` declaration removed at runtime.
    TypeOnly,
}

impl ImportKind {
    /// Returns `true` for imports that execute at runtime.
    pub fn is_runtime(&self) -> bool {
        !matches!(self, Self::TypeOnly)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic)
    }
}

/// Complete analysis of a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub source: String,
    pub specifiers: Vec<ImportSpecifier>,
    pub kind: ImportKind,
    pub resolved_to: Option<ModuleId>,
    pub span: SourceSpan,
    /// Requested lazy chunk name (`webpackChunkName` comment or the
    /// `require.ensure` name argument).
    pub chunk_hint: Option<String>,
}

impl Import {
    pub fn new(
        source: impl Into<String>,
        specifiers: Vec<ImportSpecifier>,
        kind: ImportKind,
        span: SourceSpan,
    ) -> Self {
        Self {
            source: source.into(),
            specifiers,
            kind,
            resolved_to: None,
            span,
            chunk_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.chunk_hint = hint;
        self
    }

    pub fn resolved(mut self, target: ModuleId) -> Self {
        self.resolved_to = Some(target);
        self
    }

    /// Returns `true` for side-effect-only imports (`import 'polyfill'`).
    pub fn is_side_effect_only(&self) -> bool {
        self.specifiers.is_empty() && matches!(self.kind, ImportKind::Static)
    }

    /// Returns `true` if the import only contributes types.
    pub fn is_type_only(&self) -> bool {
        matches!(self.kind, ImportKind::TypeOnly)
    }

    pub fn is_namespace_import(&self) -> bool {
        self.specifiers
            .iter()
            .any(|spec| matches!(spec, ImportSpecifier::Namespace(_)))
    }

    /// Returns `true` when every export of the target is reachable through
    /// this import (`import * as ns`, `require()`).
    pub fn consumes_all_exports(&self) -> bool {
        matches!(self.kind, ImportKind::Require)
            || (matches!(self.kind, ImportKind::Static) && self.is_namespace_import())
    }

    /// Export names this import binds, for static ESM imports.
    pub fn consumed_names(&self) -> impl Iterator<Item = &str> {
        self.specifiers.iter().filter_map(|spec| match spec {
            ImportSpecifier::Named(name) => Some(name.as_str()),
            ImportSpecifier::Default => Some("default"),
            ImportSpecifier::Namespace(_) => None,
        })
    }
}
