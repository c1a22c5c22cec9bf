//! Dead-binding removal on module source.
//!
//! Works on the statement spans recorded at parse time. An export statement
//! is cut only when every binding it declares is dead. Local declarations
//! additionally stay while the rest of the module still mentions them, and
//! in conservative mode while the module has side effects. Import and
//! re-export statements whose target was eliminated are cut too, so no
//! emitted code points at a module that no artifact contains.

use std::borrow::Cow;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use kiln_config::TreeShakingMode;
use kiln_graph::{Export, ImportKind, Liveness, Module, SourceSpan, UsageReport};
use regex::Regex;

/// Replacement text for a removed statement, if any.
type Edit = Option<String>;

/// Source of `module` with its dead statements removed.
pub(crate) fn shake<'m>(module: &'m Module, usage: &UsageReport) -> Cow<'m, str> {
    let source: &str = &module.source;
    let mut edits: BTreeMap<u32, (u32, Edit)> = BTreeMap::new();

    let mut statements: IndexMap<SourceSpan, Vec<&Export>> = IndexMap::new();
    for export in module.exports_iter() {
        statements.entry(export.span).or_default().push(export);
    }

    let strip_locals =
        usage.mode() == TreeShakingMode::Aggressive || !module.has_side_effects;

    for (span, exports) in &statements {
        if span.is_empty()
            || exports
                .iter()
                .any(|export| export.liveness != Liveness::Dead || export.is_default())
        {
            continue;
        }
        let Some(text) = slice(source, *span) else {
            continue;
        };

        let edit = if let Some(specifier) = exports[0].source.as_deref() {
            // Keep evaluating a retained target for its side effects.
            match module.resolved_re_export(specifier) {
                Some(target) if usage.retained(target) => Some(format!(
                    "import {};",
                    serde_json::Value::String(specifier.to_string())
                )),
                _ => None,
            }
        } else if is_export_list(text) {
            None
        } else {
            let locals: Vec<&str> = exports
                .iter()
                .filter_map(|export| export.local.as_deref())
                .collect();
            if !strip_locals || referenced_elsewhere(source, *span, &locals) {
                continue;
            }
            None
        };
        edits.entry(span.start).or_insert((span.end, edit));
    }

    for import in module.imports_iter() {
        if !matches!(import.kind, ImportKind::Static | ImportKind::ReExport)
            || import.span.is_empty()
        {
            continue;
        }
        if import
            .resolved_to
            .as_ref()
            .is_some_and(|target| !usage.retained(target))
        {
            edits
                .entry(import.span.start)
                .or_insert((import.span.end, None));
        }
    }

    if edits.is_empty() {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, (end, replacement)) in edits {
        let (start, end) = (start as usize, end as usize);
        if start < cursor || source.get(start..end).is_none() {
            continue;
        }
        out.push_str(&source[cursor..start]);
        if let Some(replacement) = replacement {
            out.push_str(&replacement);
        }
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    Cow::Owned(out)
}

fn slice(source: &str, span: SourceSpan) -> Option<&str> {
    source.get(span.start as usize..span.end as usize)
}

/// `export { a, b as c }` without a source: removing it drops only the
/// export, never a binding.
fn is_export_list(text: &str) -> bool {
    text.strip_prefix("export")
        .is_some_and(|rest| rest.trim_start().starts_with('{'))
}

fn referenced_elsewhere(source: &str, span: SourceSpan, names: &[&str]) -> bool {
    let (Some(before), Some(after)) = (
        source.get(..span.start as usize),
        source.get(span.end as usize..),
    ) else {
        return true;
    };

    names.iter().any(|name| {
        let pattern = format!(r"(?:^|[^\w$]){}(?:[^\w$]|$)", regex::escape(name));
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(before) || re.is_match(after),
            Err(_) => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kiln_graph::{Import, ModuleId, SourceType, UsageAnalyzer};

    use super::*;

    fn span_of(source: &str, statement: &str) -> SourceSpan {
        let start = source.find(statement).unwrap();
        SourceSpan::new(start as u32, (start + statement.len()) as u32)
    }

    fn dead(mut export: Export) -> Export {
        export.set_liveness(Liveness::Dead);
        export
    }

    fn live(mut export: Export) -> Export {
        export.set_liveness(Liveness::Live);
        export
    }

    fn module(source: &str, imports: Vec<Import>, exports: Vec<Export>, effects: bool) -> Module {
        Module::builder(
            ModuleId::new_virtual("lib.js"),
            PathBuf::from("lib.js"),
            SourceType::JavaScript,
        )
        .source(source)
        .imports(imports)
        .exports(exports)
        .side_effects(effects)
        .build()
    }

    fn empty_usage(mode: TreeShakingMode) -> UsageReport {
        UsageAnalyzer::new(mode).analyze(&kiln_graph::ModuleGraph::new())
    }

    #[test]
    fn dead_declaration_is_cut() {
        let source = "export const used = 1;\nexport const cube = () => 'CUBE';\n";
        let module = module(
            source,
            Vec::new(),
            vec![
                live(Export::named("used", "used", span_of(source, "export const used = 1;"))),
                dead(Export::named(
                    "cube",
                    "cube",
                    span_of(source, "export const cube = () => 'CUBE';"),
                )),
            ],
            false,
        );

        let shaken = shake(&module, &empty_usage(TreeShakingMode::Conservative));
        assert_eq!(shaken, "export const used = 1;\n\n");
    }

    #[test]
    fn referenced_binding_is_kept() {
        let source = "export const cube = (n) => n * n * n;\nexport const used = cube(2);\n";
        let module = module(
            source,
            Vec::new(),
            vec![
                dead(Export::named(
                    "cube",
                    "cube",
                    span_of(source, "export const cube = (n) => n * n * n;"),
                )),
                live(Export::named("used", "used", span_of(source, "export const used = cube(2);"))),
            ],
            false,
        );

        let shaken = shake(&module, &empty_usage(TreeShakingMode::Conservative));
        assert!(matches!(shaken, Cow::Borrowed(_)));
    }

    #[test]
    fn side_effecting_module_keeps_locals_unless_aggressive() {
        let source = "window.ready = true;\nexport function helper() {}\n";
        let exports = vec![dead(Export::named(
            "helper",
            "helper",
            span_of(source, "export function helper() {}"),
        ))];
        let module = module(source, Vec::new(), exports, true);

        let conservative = shake(&module, &empty_usage(TreeShakingMode::Conservative));
        assert_eq!(conservative, source);

        let aggressive = shake(&module, &empty_usage(TreeShakingMode::Aggressive));
        assert_eq!(aggressive, "window.ready = true;\n\n");
    }

    #[test]
    fn dead_export_list_is_cut_but_bindings_stay() {
        let source = "const a = 1;\nexport { a };\n";
        let module = module(
            source,
            Vec::new(),
            vec![dead(Export::named("a", "a", span_of(source, "export { a };")))],
            true,
        );

        let shaken = shake(&module, &empty_usage(TreeShakingMode::Conservative));
        assert_eq!(shaken, "const a = 1;\n\n");
    }

    #[test]
    fn import_of_eliminated_module_is_cut() {
        let source = "import './pure.js';\nconsole.log(1);\n";
        let statement = "import './pure.js';";
        let import = Import::new("./pure.js", Vec::new(), ImportKind::Static, span_of(source, statement))
            .resolved(ModuleId::new_virtual("pure.js"));
        let module = module(source, vec![import], Vec::new(), true);

        let shaken = shake(&module, &empty_usage(TreeShakingMode::Conservative));
        assert_eq!(shaken, "\nconsole.log(1);\n");
    }

    #[test]
    fn unspanned_exports_are_left_alone() {
        let source = "export const x = 1;\n";
        let module = module(
            source,
            Vec::new(),
            vec![dead(Export::named("x", "x", SourceSpan::default()))],
            false,
        );
        assert_eq!(shake(&module, &empty_usage(TreeShakingMode::Conservative)), source);
    }
}
