//! Visitor for import-like calls that may appear anywhere in a module:
//! `import()`, `require()`, `require.include()` and `require.ensure()`.

use std::sync::LazyLock;

use oxc_ast::ast::{Argument, CallExpression, Expression, ImportExpression, Program};
use oxc_ast_visit::{Visit, walk};
use oxc_span::{GetSpan, Span};
use regex::Regex;

use crate::{Import, ImportKind};

static CHUNK_NAME_COMMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?:webpackChunkName|kilnChunkName)\s*:\s*["']([^"']+)["']"#).ok()
});

enum RequireCall {
    Require,
    Include,
    Ensure,
}

pub(super) struct CallCollector<'s> {
    source: &'s str,
    imports: Vec<Import>,
    /// Chunk names of the enclosing `require.ensure` callbacks.
    ensure_hints: Vec<Option<String>>,
}

impl<'s> CallCollector<'s> {
    pub(super) fn new(source: &'s str) -> Self {
        Self {
            source,
            imports: Vec::new(),
            ensure_hints: Vec::new(),
        }
    }

    pub(super) fn collect(&mut self, program: &Program<'_>) {
        self.visit_program(program);
    }

    pub(super) fn into_imports(self) -> Vec<Import> {
        self.imports
    }

    fn chunk_hint_in(&self, span: Span) -> Option<String> {
        let text = self.source.get(span.start as usize..span.end as usize)?;
        CHUNK_NAME_COMMENT
            .as_ref()?
            .captures(text)
            .map(|caps| caps[1].trim().to_string())
    }

    fn push(&mut self, specifier: String, kind: ImportKind, span: Span, hint: Option<String>) {
        self.imports
            .push(Import::new(specifier, Vec::new(), kind, span.into()).with_hint(hint));
    }

    fn record_ensure(&mut self, call: &CallExpression<'_>) -> Option<String> {
        let hint = call
            .arguments
            .iter()
            .skip(2)
            .filter_map(Argument::as_expression)
            .find_map(|expr| match expr {
                Expression::StringLiteral(lit) => Some(lit.value.to_string()),
                _ => None,
            });

        if let Some(Expression::ArrayExpression(deps)) =
            call.arguments.first().and_then(Argument::as_expression)
        {
            for element in &deps.elements {
                if let Some(expr) = element.as_expression() {
                    if let Some(specifier) = literal_specifier(expr) {
                        self.push(specifier, ImportKind::Dynamic, expr.span(), hint.clone());
                    }
                }
            }
        }

        hint
    }
}

impl<'a> Visit<'a> for CallCollector<'_> {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        match literal_specifier(&expr.source) {
            Some(specifier) => {
                let hint = self.chunk_hint_in(expr.span);
                self.push(specifier, ImportKind::Dynamic, expr.span, hint);
            }
            None => tracing::debug!("skipping import() with a computed specifier"),
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let Some(kind) = require_call(&call.callee) else {
            walk::walk_call_expression(self, call);
            return;
        };

        match kind {
            RequireCall::Require => {
                if let Some(specifier) = first_literal_argument(call) {
                    // Inside a `require.ensure` callback the module belongs
                    // to the lazy chunk.
                    match self.ensure_hints.last().cloned() {
                        Some(hint) => self.push(specifier, ImportKind::Dynamic, call.span, hint),
                        None => self.push(specifier, ImportKind::Require, call.span, None),
                    }
                }
                walk::walk_call_expression(self, call);
            }
            RequireCall::Include => {
                if let Some(specifier) = first_literal_argument(call) {
                    self.push(specifier, ImportKind::Include, call.span, None);
                }
                walk::walk_call_expression(self, call);
            }
            RequireCall::Ensure => {
                let hint = self.record_ensure(call);
                self.ensure_hints.push(hint);
                walk::walk_call_expression(self, call);
                self.ensure_hints.pop();
            }
        }
    }
}

fn require_call(callee: &Expression<'_>) -> Option<RequireCall> {
    match callee {
        Expression::Identifier(ident) if ident.name.as_str() == "require" => {
            Some(RequireCall::Require)
        }
        Expression::StaticMemberExpression(member) => {
            let Expression::Identifier(object) = &member.object else {
                return None;
            };
            if object.name.as_str() != "require" {
                return None;
            }
            match member.property.name.as_str() {
                "include" => Some(RequireCall::Include),
                "ensure" => Some(RequireCall::Ensure),
                _ => None,
            }
        }
        _ => None,
    }
}

fn first_literal_argument(call: &CallExpression<'_>) -> Option<String> {
    call.arguments
        .first()
        .and_then(Argument::as_expression)
        .and_then(literal_specifier)
}

/// String literal or substitution-free template literal.
fn literal_specifier(expr: &Expression<'_>) -> Option<String> {
    match expr {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        Expression::TemplateLiteral(template) if template.expressions.is_empty() => template
            .quasis
            .first()
            .map(|quasi| quasi.value.raw.to_string()),
        _ => None,
    }
}
