use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Export, Import, ModuleId};

/// Resolved module metadata used by graph algorithms and builders.
///
/// Heavy collections (source, imports, exports) are wrapped in Arc
/// to make cloning cheap when returning modules from the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub source_type: SourceType,
    /// Source text after transforms.
    pub source: Arc<str>,
    #[serde(with = "arc_vec_serde")]
    pub imports: Arc<Vec<Import>>,
    #[serde(with = "arc_vec_serde")]
    pub exports: Arc<Vec<Export>>,
    pub has_side_effects: bool,
    pub is_entry: bool,
    /// Size of the transformed source in bytes.
    pub original_size: usize,
    /// Position in the breadth-first walk from the entries.
    pub discovery_order: u32,
}

// Serde helper for Arc<Vec<T>>
mod arc_vec_serde {
    use super::*;
    use serde::de::Deserializer;
    use serde::ser::Serializer;

    pub fn serialize<S, T>(value: &Arc<Vec<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        value.as_ref().serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Arc<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Vec::deserialize(deserializer).map(Arc::new)
    }
}

impl Module {
    /// Create a new module builder with sensible defaults.
    pub fn builder(id: ModuleId, path: PathBuf, source_type: SourceType) -> ModuleBuilder {
        ModuleBuilder {
            module: Self {
                id,
                path,
                source_type,
                source: Arc::from(""),
                imports: Arc::new(Vec::new()),
                exports: Arc::new(Vec::new()),
                has_side_effects: false,
                is_entry: false,
                original_size: 0,
                discovery_order: 0,
            },
        }
    }

    pub fn mark_entry(&mut self) {
        self.is_entry = true;
    }

    pub fn imports_iter(&self) -> impl Iterator<Item = &Import> {
        self.imports.iter()
    }

    pub fn exports_iter(&self) -> impl Iterator<Item = &Export> {
        self.exports.iter()
    }

    /// Get mutable access to exports.
    ///
    /// This uses Arc::make_mut to create a mutable copy only when needed.
    pub fn exports_mut(&mut self) -> &mut Vec<Export> {
        Arc::make_mut(&mut self.exports)
    }

    /// Imports that open a lazy chunk boundary.
    pub fn dynamic_imports(&self) -> impl Iterator<Item = &Import> {
        self.imports.iter().filter(|imp| imp.kind.is_dynamic())
    }

    /// Own (non-star) export by name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports
            .iter()
            .find(|export| !export.is_star_re_export() && export.name == name)
    }

    /// Resolved targets of `export * from` declarations, in source order.
    pub fn star_export_targets(&self) -> Vec<&ModuleId> {
        self.exports
            .iter()
            .filter(|export| export.is_star_re_export())
            .filter_map(|export| export.source.as_deref())
            .filter_map(|source| self.resolved_re_export(source))
            .collect()
    }

    /// Module a re-export specifier resolved to.
    pub fn resolved_re_export(&self, source: &str) -> Option<&ModuleId> {
        self.imports
            .iter()
            .find(|imp| imp.kind == super::ImportKind::ReExport && imp.source == source)
            .and_then(|imp| imp.resolved_to.as_ref())
    }

    pub fn is_virtual(&self) -> bool {
        self.id.is_virtual()
    }
}

/// Builder for `Module` to avoid long argument lists in constructors.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn source(mut self, source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        self.module.original_size = source.len();
        self.module.source = source;
        self
    }

    pub fn imports(mut self, imports: Vec<Import>) -> Self {
        self.module.imports = Arc::new(imports);
        self
    }

    pub fn exports(mut self, exports: Vec<Export>) -> Self {
        self.module.exports = Arc::new(exports);
        self
    }

    pub fn side_effects(mut self, has_side_effects: bool) -> Self {
        self.module.has_side_effects = has_side_effects;
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.module.is_entry = is_entry;
        self
    }

    /// Override the size derived from `source` (fixtures without source text).
    pub fn original_size(mut self, original_size: usize) -> Self {
        self.module.original_size = original_size;
        self
    }

    pub fn discovery_order(mut self, order: u32) -> Self {
        self.module.discovery_order = order;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// Resolved module source type derived from file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Json,
    Css,
    Unknown,
}

impl SourceType {
    /// Derive the source type from a file extension string.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "jsx" => Self::Jsx,
            "tsx" => Self::Tsx,
            "json" => Self::Json,
            "css" => Self::Css,
            _ => Self::Unknown,
        }
    }

    /// Attempt to infer the source type from a file path.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Returns true if the file is JavaScript/TypeScript based.
    pub fn is_javascript_like(&self) -> bool {
        matches!(
            self,
            Self::JavaScript | Self::TypeScript | Self::Jsx | Self::Tsx
        )
    }

    /// Modules whose imports are never inspected.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Json | Self::Css)
    }
}
