//! Source transforms applied between reading a module and parsing it.

use std::sync::Arc;

use thiserror::Error;

use super::{ModuleId, SourceType};

/// A module's source as it flows through the transform pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub id: ModuleId,
    pub source_type: SourceType,
    pub code: String,
}

#[derive(Debug, Error)]
#[error("transform '{plugin}' failed on {module}: {message}")]
pub struct TransformError {
    pub plugin: String,
    pub module: ModuleId,
    pub message: String,
}

impl TransformError {
    pub fn new(plugin: impl Into<String>, module: ModuleId, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            module,
            message: message.into(),
        }
    }
}

/// Rewrites module source before import/export extraction.
///
/// Transforms may change the source type (e.g. compile a dialect down to
/// JavaScript) but must leave the identity alone.
pub trait SourceTransform: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, source: ModuleSource) -> Result<ModuleSource, TransformError>;
}

/// Ordered list of transforms, applied first to last.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn SourceTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Arc<dyn SourceTransform>) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply(&self, mut source: ModuleSource) -> Result<ModuleSource, TransformError> {
        for transform in &self.transforms {
            let id = source.id.clone();
            source = transform.transform(source)?;
            if source.id != id {
                return Err(TransformError::new(
                    transform.name(),
                    id,
                    "transforms must not change the module identity",
                ));
            }
        }
        Ok(source)
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        f.debug_struct("TransformPipeline")
            .field("transforms", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Replace(&'static str, &'static str);

    impl SourceTransform for Replace {
        fn name(&self) -> &str {
            "replace"
        }

        fn transform(&self, mut source: ModuleSource) -> Result<ModuleSource, TransformError> {
            source.code = source.code.replace(self.0, self.1);
            Ok(source)
        }
    }

    struct Rename;

    impl SourceTransform for Rename {
        fn name(&self) -> &str {
            "rename"
        }

        fn transform(&self, mut source: ModuleSource) -> Result<ModuleSource, TransformError> {
            source.id = ModuleId::new_virtual("other");
            Ok(source)
        }
    }

    fn source(code: &str) -> ModuleSource {
        ModuleSource {
            id: ModuleId::new_virtual("a.js"),
            source_type: SourceType::JavaScript,
            code: code.to_string(),
        }
    }

    #[test]
    fn transforms_run_in_order() {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Arc::new(Replace("__ENV__", "'production'")));
        pipeline.push(Arc::new(Replace("'production'", "'prod'")));

        let out = pipeline.apply(source("const env = __ENV__;")).unwrap();
        assert_eq!(out.code, "const env = 'prod';");
    }

    #[test]
    fn identity_changes_are_rejected() {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Arc::new(Rename));
        let err = pipeline.apply(source("")).unwrap_err();
        assert_eq!(err.plugin, "rename");
    }
}
