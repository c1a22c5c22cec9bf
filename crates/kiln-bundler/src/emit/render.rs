//! Chunk code generation.
//!
//! A chunk registers itself with the runtime loader:
//!
//! ```text
//! (self.__kiln_chunks = self.__kiln_chunks || []).push({
//!   name: "main",
//!   imports: ["vendor"],
//!   dynamic: { "./src/lazy.js": "lazy" },
//!   modules: {
//!     "./src/main.js": {
//!       deps: { "./lazy": "./src/lazy.js" },
//!       factory: function (module, exports, require, loadChunk) { ... }
//!     }
//!   }
//! });
//! self.__kiln_boot("main", ["vendor"], ["./src/main.js"]);
//! ```
//!
//! Module bodies have their dead export statements removed first. `deps`
//! maps each specifier a module uses to a retained module key; `dynamic`
//! maps lazily imported module keys to the chunk `loadChunk` must fetch.
//! Only entry chunks end with a boot call.

use std::path::Path;

use indexmap::IndexMap;
use kiln_graph::{Module, ModuleGraph, ModuleId, SourceType, UsageReport};
use serde_json::Value;

use super::shake::shake;
use crate::chunk::{Chunk, ChunkPlan};

pub(crate) struct ChunkRenderer<'a> {
    pub graph: &'a ModuleGraph,
    pub usage: &'a UsageReport,
    pub plan: &'a ChunkPlan,
    pub root: &'a Path,
}

impl ChunkRenderer<'_> {
    pub fn render(&self, chunk: &Chunk, order: &[ModuleId]) -> String {
        let mut out = String::new();
        out.push_str("(self.__kiln_chunks = self.__kiln_chunks || []).push({\n");
        out.push_str(&format!("  name: {},\n", js_string(&chunk.name)));
        out.push_str(&format!("  imports: {},\n", self.chunk_names(&chunk.imports)));

        let dynamic = self.dynamic_table(order);
        if dynamic.is_empty() {
            out.push_str("  dynamic: {},\n");
        } else {
            out.push_str("  dynamic: {\n");
            let rows: Vec<String> = dynamic
                .iter()
                .map(|(key, chunk)| format!("    {}: {}", js_string(key), js_string(chunk)))
                .collect();
            out.push_str(&rows.join(",\n"));
            out.push_str("\n  },\n");
        }

        out.push_str("  modules: {\n");
        let modules: Vec<String> = order
            .iter()
            .filter_map(|id| self.graph.module(id))
            .map(|module| self.render_module(&module))
            .collect();
        out.push_str(&modules.join(",\n"));
        if !modules.is_empty() {
            out.push('\n');
        }
        out.push_str("  }\n});\n");

        if chunk.kind.is_initial() {
            let entries: Vec<Value> = chunk
                .roots
                .iter()
                .map(|id| Value::String(id.relative_key(self.root)))
                .collect();
            out.push_str(&format!(
                "self.__kiln_boot({}, {}, {});\n",
                js_string(&chunk.name),
                self.chunk_names(&chunk.imports),
                Value::Array(entries)
            ));
        }

        out
    }

    fn render_module(&self, module: &Module) -> String {
        let key = module.id.relative_key(self.root);
        let mut out = format!("    {}: {{\n", js_string(&key));

        let deps: IndexMap<&str, String> = module
            .imports_iter()
            .filter(|import| import.kind.is_runtime())
            .filter_map(|import| {
                import
                    .resolved_to
                    .as_ref()
                    .filter(|target| self.usage.retained(target))
                    .map(|target| (import.source.as_str(), target.relative_key(self.root)))
            })
            .collect();
        let deps: Vec<String> = deps
            .iter()
            .map(|(specifier, key)| format!("{}: {}", js_string(specifier), js_string(key)))
            .collect();
        out.push_str(&format!("      deps: {{{}}},\n", deps.join(", ")));

        out.push_str("      factory: function (module, exports, require, loadChunk) {\n");
        if !module.exports.is_empty() {
            let live = self.usage.live_exports(&module.id);
            let live = if live.is_empty() {
                "(none)".to_string()
            } else {
                live.join(", ")
            };
            out.push_str(&format!("/* exports used: {live} */\n"));
        }
        out.push_str(&module_body(module, self.usage));
        out.push_str("      }\n    }");
        out
    }

    /// Lazily imported module key → owning chunk name, in member order.
    fn dynamic_table(&self, order: &[ModuleId]) -> IndexMap<String, String> {
        let mut table = IndexMap::new();
        for id in order {
            for target in self.graph.dynamic_dependencies(id) {
                if let Some(chunk) = self.plan.root_chunk(&target) {
                    table
                        .entry(target.relative_key(self.root))
                        .or_insert_with(|| self.plan.chunk_name(chunk).to_string());
                }
            }
        }
        table
    }

    fn chunk_names(&self, ids: &[crate::chunk::ChunkId]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| Value::String(self.plan.chunk_name(*id).to_string()))
                .collect(),
        )
    }
}

fn module_body(module: &Module, usage: &UsageReport) -> String {
    let mut body = match module.source_type {
        SourceType::Json => format!("module.exports = {};", module.source.trim()),
        SourceType::Css => format!("module.exports = {};", js_string(&module.source)),
        _ => shake(module, usage).into_owned(),
    };
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_escaped() {
        assert_eq!(js_string("a\"b"), r#""a\"b""#);
        assert_eq!(js_string("main~b"), "\"main~b\"");
    }
}
