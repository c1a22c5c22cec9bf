//! Top-level side-effect detection.
//!
//! A module is side-effecting when evaluating its top level could be observed
//! by something other than its exports.

use oxc_ast::ast::{
    ArrayExpressionElement, ExportDefaultDeclaration, ExportDefaultDeclarationKind, Expression,
    ObjectPropertyKind, Statement,
};

/// Side-effect verdict for a top-level statement that is not an import or
/// export declaration.
pub(super) fn statement_has_side_effects(stmt: &Statement<'_>) -> bool {
    match stmt {
        Statement::EmptyStatement(_)
        | Statement::FunctionDeclaration(_)
        | Statement::ClassDeclaration(_)
        | Statement::TSTypeAliasDeclaration(_)
        | Statement::TSInterfaceDeclaration(_)
        | Statement::TSEnumDeclaration(_) => false,
        Statement::VariableDeclaration(var) => var.declarations.iter().any(|decl| {
            decl.init
                .as_ref()
                .is_some_and(|init| !is_pure_expression(init))
        }),
        _ => true,
    }
}

pub(super) fn default_export_has_side_effects(default: &ExportDefaultDeclaration<'_>) -> bool {
    match &default.declaration {
        ExportDefaultDeclarationKind::FunctionDeclaration(_)
        | ExportDefaultDeclarationKind::ClassDeclaration(_)
        | ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => false,
        other => other
            .as_expression()
            .is_some_and(|expr| !is_pure_expression(expr)),
    }
}

/// Expressions whose evaluation cannot be observed.
pub(super) fn is_pure_expression(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::StringLiteral(_)
        | Expression::RegExpLiteral(_)
        | Expression::Identifier(_)
        | Expression::FunctionExpression(_)
        | Expression::ArrowFunctionExpression(_)
        | Expression::ClassExpression(_) => true,
        Expression::TemplateLiteral(template) => template.expressions.is_empty(),
        Expression::ArrayExpression(array) => array.elements.iter().all(|element| match element {
            ArrayExpressionElement::Elision(_) => true,
            ArrayExpressionElement::SpreadElement(_) => false,
            other => other.as_expression().is_some_and(is_pure_expression),
        }),
        Expression::ObjectExpression(object) => {
            object.properties.iter().all(|property| match property {
                ObjectPropertyKind::ObjectProperty(prop) => {
                    !prop.computed && is_pure_expression(&prop.value)
                }
                ObjectPropertyKind::SpreadProperty(_) => false,
            })
        }
        Expression::ParenthesizedExpression(paren) => is_pure_expression(&paren.expression),
        _ => false,
    }
}
