use serde::{Deserialize, Serialize};

use super::SourceSpan;

/// Export declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    Named,
    Default,
    /// `export { a as b } from './module'` or `export * as ns from './module'`
    ReExport,
    /// Star re-export: `export * from './module'`
    ///
    /// This re-exports all named exports from the source module.
    /// Unlike `ReExport`, this doesn't specify individual export names.
    StarReExport,
}

/// Usage verdict for an exported binding.
///
/// Starts `Unknown` and is written once per analysis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    #[default]
    Unknown,
    Live,
    Dead,
}

/// Complete metadata describing a module export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Export {
    /// Exported name (`*` for star re-exports).
    pub name: String,
    pub kind: ExportKind,
    /// Local binding, or the imported name for re-exports (`*` for
    /// `export * as ns`).
    pub local: Option<String>,
    /// Specifier of the re-exported module.
    pub source: Option<String>,
    pub span: SourceSpan,
    pub liveness: Liveness,
}

impl Export {
    pub fn named(name: impl Into<String>, local: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            name: name.into(),
            kind: ExportKind::Named,
            local: Some(local.into()),
            source: None,
            span,
            liveness: Liveness::Unknown,
        }
    }

    pub fn default_export(span: SourceSpan) -> Self {
        Self {
            name: "default".to_string(),
            kind: ExportKind::Default,
            local: None,
            source: None,
            span,
            liveness: Liveness::Unknown,
        }
    }

    pub fn re_export(
        name: impl Into<String>,
        imported: impl Into<String>,
        source: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ExportKind::ReExport,
            local: Some(imported.into()),
            source: Some(source.into()),
            span,
            liveness: Liveness::Unknown,
        }
    }

    pub fn star(source: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            name: "*".to_string(),
            kind: ExportKind::StarReExport,
            local: None,
            source: Some(source.into()),
            span,
            liveness: Liveness::Unknown,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self.kind, ExportKind::Default)
    }

    /// Returns true if the export re-exports from another module.
    pub fn is_re_export(&self) -> bool {
        matches!(self.kind, ExportKind::ReExport | ExportKind::StarReExport)
    }

    pub fn is_star_re_export(&self) -> bool {
        matches!(self.kind, ExportKind::StarReExport)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.liveness, Liveness::Live)
    }

    pub fn set_liveness(&mut self, liveness: Liveness) {
        self.liveness = liveness;
    }
}
