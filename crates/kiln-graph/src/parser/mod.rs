//! Import/export extraction.
//!
//! The graph builder never looks at syntax itself: a [`ModuleParser`] turns
//! module source into import records, export records and a side-effect
//! verdict. [`OxcParser`] is the default front-end.

mod side_effects;
mod visitor;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Declaration, ExportAllDeclaration, ExportDefaultDeclaration, ExportNamedDeclaration,
    ImportDeclaration, ImportDeclarationSpecifier, ModuleDeclaration, ModuleExportName, Program,
};
use oxc_parser::Parser;
use oxc_span::SourceType as OxcSourceType;
use thiserror::Error;

use crate::span::line_column;
use crate::{Export, Import, ImportKind, ImportSpecifier, ModuleId, SourceSpan, SourceType};

use side_effects::{default_export_has_side_effects, statement_has_side_effects};
use visitor::CallCollector;

/// Import/export structure of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModule {
    /// Imports in source order, unresolved.
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub has_side_effects: bool,
}

/// Syntax error in a module, positioned at the first reported problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to parse {module} at {line}:{column}: {message}")]
pub struct ParseError {
    pub module: ModuleId,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Front-end that extracts a module's imports and exports.
pub trait ModuleParser: Send + Sync {
    fn parse(
        &self,
        id: &ModuleId,
        source: &str,
        source_type: SourceType,
    ) -> Result<ParsedModule, ParseError>;
}

/// `oxc`-backed parser.
///
/// Json modules export `default`; stylesheets export nothing and always count
/// as side-effecting. Everything else is parsed as an ES module.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcParser;

impl OxcParser {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleParser for OxcParser {
    fn parse(
        &self,
        id: &ModuleId,
        source: &str,
        source_type: SourceType,
    ) -> Result<ParsedModule, ParseError> {
        match source_type {
            SourceType::Json => {
                return Ok(ParsedModule {
                    imports: Vec::new(),
                    exports: vec![Export::default_export(SourceSpan::default())],
                    has_side_effects: false,
                });
            }
            SourceType::Css => {
                return Ok(ParsedModule {
                    imports: Vec::new(),
                    exports: Vec::new(),
                    has_side_effects: true,
                });
            }
            _ => {}
        }

        let allocator = Allocator::default();
        let parser_return =
            Parser::new(&allocator, source, convert_source_type(source_type, id)).parse();

        if let Some(error) = parser_return.errors.first() {
            let offset = error
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map_or(0, |label| label.offset());
            let (line, column) = line_column(source, offset);
            return Err(ParseError {
                module: id.clone(),
                message: error.to_string(),
                line,
                column,
            });
        }

        Ok(extract(&parser_return.program, source))
    }
}

fn convert_source_type(source_type: SourceType, id: &ModuleId) -> OxcSourceType {
    match source_type {
        SourceType::JavaScript => OxcSourceType::from_path(id.as_path())
            .unwrap_or_else(|_| OxcSourceType::mjs()),
        SourceType::TypeScript => OxcSourceType::ts(),
        SourceType::Jsx => OxcSourceType::jsx(),
        SourceType::Tsx => OxcSourceType::tsx(),
        _ => OxcSourceType::mjs(),
    }
}

fn extract(program: &Program<'_>, source: &str) -> ParsedModule {
    let mut parsed = ParsedModule::default();

    for stmt in &program.body {
        match stmt.as_module_declaration() {
            Some(ModuleDeclaration::ImportDeclaration(import)) => {
                parsed.imports.push(import_record(import));
            }
            Some(ModuleDeclaration::ExportNamedDeclaration(named)) => {
                if named_export_has_side_effects(named) {
                    parsed.has_side_effects = true;
                }
                collect_named_export(named, &mut parsed);
            }
            Some(ModuleDeclaration::ExportDefaultDeclaration(default)) => {
                collect_default_export(default, &mut parsed);
            }
            Some(ModuleDeclaration::ExportAllDeclaration(all)) => {
                collect_export_all(all, &mut parsed);
            }
            Some(_) => {}
            None => {
                if statement_has_side_effects(stmt) {
                    parsed.has_side_effects = true;
                }
            }
        }
    }

    let mut calls = CallCollector::new(source);
    calls.collect(program);
    parsed.imports.extend(calls.into_imports());
    parsed.imports.sort_by_key(|import| import.span.start);

    parsed
}

fn module_export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

fn import_record(import: &ImportDeclaration<'_>) -> Import {
    let mut specifiers = Vec::new();
    let mut type_only_specifiers = 0;

    if let Some(specs) = &import.specifiers {
        for spec in specs {
            match spec {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => {
                    specifiers.push(ImportSpecifier::Default);
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(ns) => {
                    specifiers.push(ImportSpecifier::Namespace(ns.local.name.to_string()));
                }
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    if named.import_kind.is_type() {
                        type_only_specifiers += 1;
                        continue;
                    }
                    specifiers.push(ImportSpecifier::Named(module_export_name(&named.imported)));
                }
            }
        }
    }

    let kind = if import.import_kind.is_type()
        || (type_only_specifiers > 0 && specifiers.is_empty())
    {
        ImportKind::TypeOnly
    } else {
        ImportKind::Static
    };

    Import::new(
        import.source.value.to_string(),
        specifiers,
        kind,
        import.span.into(),
    )
}

fn named_export_has_side_effects(named: &ExportNamedDeclaration<'_>) -> bool {
    match &named.declaration {
        Some(Declaration::VariableDeclaration(var)) => var.declarations.iter().any(|decl| {
            decl.init
                .as_ref()
                .is_some_and(|init| !side_effects::is_pure_expression(init))
        }),
        _ => false,
    }
}

fn collect_named_export(named: &ExportNamedDeclaration<'_>, parsed: &mut ParsedModule) {
    let span: SourceSpan = named.span.into();

    if let Some(src) = &named.source {
        let source = src.value.to_string();
        if named.export_kind.is_type() {
            parsed
                .imports
                .push(Import::new(source, Vec::new(), ImportKind::TypeOnly, span));
            return;
        }

        let mut specifiers = Vec::new();
        for spec in &named.specifiers {
            if spec.export_kind.is_type() {
                continue;
            }
            let imported = module_export_name(&spec.local);
            let exported = module_export_name(&spec.exported);
            specifiers.push(if imported == "default" {
                ImportSpecifier::Default
            } else {
                ImportSpecifier::Named(imported.clone())
            });
            parsed
                .exports
                .push(Export::re_export(exported, imported, source.clone(), span));
        }
        parsed
            .imports
            .push(Import::new(source, specifiers, ImportKind::ReExport, span));
        return;
    }

    if named.export_kind.is_type() {
        return;
    }

    if let Some(decl) = &named.declaration {
        match decl {
            Declaration::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    parsed
                        .exports
                        .push(Export::named(id.name.to_string(), id.name.to_string(), span));
                }
            }
            Declaration::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    parsed
                        .exports
                        .push(Export::named(id.name.to_string(), id.name.to_string(), span));
                }
            }
            Declaration::VariableDeclaration(var) => {
                for decl in &var.declarations {
                    if let oxc_ast::ast::BindingPatternKind::BindingIdentifier(ident) =
                        &decl.id.kind
                    {
                        parsed.exports.push(Export::named(
                            ident.name.to_string(),
                            ident.name.to_string(),
                            span,
                        ));
                    }
                }
            }
            Declaration::TSEnumDeclaration(decl) => {
                parsed.exports.push(Export::named(
                    decl.id.name.to_string(),
                    decl.id.name.to_string(),
                    span,
                ));
            }
            _ => {}
        }
    }

    for spec in &named.specifiers {
        if spec.export_kind.is_type() {
            continue;
        }
        parsed.exports.push(Export::named(
            module_export_name(&spec.exported),
            module_export_name(&spec.local),
            span,
        ));
    }
}

fn collect_default_export(default: &ExportDefaultDeclaration<'_>, parsed: &mut ParsedModule) {
    if default_export_has_side_effects(default) {
        parsed.has_side_effects = true;
    }
    parsed
        .exports
        .push(Export::default_export(default.span.into()));
}

fn collect_export_all(all: &ExportAllDeclaration<'_>, parsed: &mut ParsedModule) {
    let span: SourceSpan = all.span.into();
    let source = all.source.value.to_string();

    if all.export_kind.is_type() {
        parsed
            .imports
            .push(Import::new(source, Vec::new(), ImportKind::TypeOnly, span));
        return;
    }

    match &all.exported {
        Some(name) => {
            let exported = module_export_name(name);
            parsed
                .exports
                .push(Export::re_export(exported.clone(), "*", source.clone(), span));
            parsed.imports.push(Import::new(
                source,
                vec![ImportSpecifier::Namespace(exported)],
                ImportKind::ReExport,
                span,
            ));
        }
        None => {
            parsed.exports.push(Export::star(source.clone(), span));
            parsed
                .imports
                .push(Import::new(source, Vec::new(), ImportKind::ReExport, span));
        }
    }
}
