//! Static evaluation of literal-shaped expressions.
//!
//! The extractors never type-check user code; they only need to read values
//! that are spelled out literally in the source. Everything here works on
//! oxc expression nodes and returns `None` for anything that is not
//! statically known.

use oxc_ast::ast::{Argument, Expression, ObjectExpression, ObjectPropertyKind, PropertyKey};
use oxc_syntax::operator::UnaryOperator;

/// Sees through parentheses and type-only wrappers (`as`, `satisfies`, `!`,
/// `<T>x`), none of which change the runtime value.
pub fn unwrap_expression<'b, 'a>(mut expr: &'b Expression<'a>) -> &'b Expression<'a> {
    loop {
        expr = match expr {
            Expression::ParenthesizedExpression(e) => &e.expression,
            Expression::TSAsExpression(e) => &e.expression,
            Expression::TSSatisfiesExpression(e) => &e.expression,
            Expression::TSNonNullExpression(e) => &e.expression,
            Expression::TSTypeAssertion(e) => &e.expression,
            _ => return expr,
        };
    }
}

pub fn unwrap_expression_mut<'b, 'a>(expr: &'b mut Expression<'a>) -> &'b mut Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(e) => unwrap_expression_mut(&mut e.expression),
        Expression::TSAsExpression(e) => unwrap_expression_mut(&mut e.expression),
        Expression::TSSatisfiesExpression(e) => unwrap_expression_mut(&mut e.expression),
        Expression::TSNonNullExpression(e) => unwrap_expression_mut(&mut e.expression),
        Expression::TSTypeAssertion(e) => unwrap_expression_mut(&mut e.expression),
        other => other,
    }
}

pub fn argument_expression<'b, 'a>(arg: &'b Argument<'a>) -> Option<&'b Expression<'a>> {
    arg.as_expression().map(unwrap_expression)
}

pub fn argument_expression_mut<'b, 'a>(arg: &'b mut Argument<'a>) -> Option<&'b mut Expression<'a>> {
    arg.as_expression_mut().map(unwrap_expression_mut)
}

/// Name of a bare identifier reference.
pub fn identifier_name<'b>(expr: &'b Expression<'_>) -> Option<&'b str> {
    match unwrap_expression(expr) {
        Expression::Identifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

/// Value of a string literal or a substitution-free template literal.
pub fn string_value(expr: &Expression<'_>) -> Option<String> {
    match unwrap_expression(expr) {
        Expression::StringLiteral(s) => Some(s.value.to_string()),
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => {
            let quasi = tpl.quasis.first()?;
            Some(
                quasi
                    .value
                    .cooked
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| quasi.value.raw.to_string()),
            )
        }
        _ => None,
    }
}

/// Boolean value of an expression spelled as `true`/`false`, as a bare
/// `true`/`false` identifier, or as `!` applied to `0`, `1` or either of
/// those. Anything else is `None`, which callers treat as "unset".
pub fn bool_value(expr: &Expression<'_>) -> Option<bool> {
    match unwrap_expression(expr) {
        Expression::BooleanLiteral(b) => Some(b.value),
        Expression::Identifier(id) => match id.name.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            match unwrap_expression(&unary.argument) {
                Expression::NumericLiteral(n) if n.value == 0.0 => Some(true),
                Expression::NumericLiteral(n) if n.value == 1.0 => Some(false),
                other => bool_value(other).map(|b| !b),
            }
        }
        _ => None,
    }
}

/// JSON form of a primitive literal (string, number, boolean, null).
pub fn literal_json(expr: &Expression<'_>) -> Option<serde_json::Value> {
    if let Some(s) = string_value(expr) {
        return Some(serde_json::Value::String(s));
    }
    if let Some(b) = bool_value(expr) {
        return Some(serde_json::Value::Bool(b));
    }
    match unwrap_expression(expr) {
        Expression::NumericLiteral(n) => {
            serde_json::Number::from_f64(n.value).map(serde_json::Value::Number)
        }
        Expression::NullLiteral(_) => Some(serde_json::Value::Null),
        _ => None,
    }
}

/// Static name of a non-computed property key.
pub fn property_key_name<'b>(key: &'b PropertyKey<'_>) -> Option<&'b str> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str()),
        PropertyKey::StringLiteral(s) => Some(s.value.as_str()),
        _ => None,
    }
}

/// Value of the first plain `name: value` property in an object literal.
pub fn find_property<'b, 'a>(
    obj: &'b ObjectExpression<'a>,
    name: &str,
) -> Option<&'b Expression<'a>> {
    obj.properties.iter().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p) if !p.computed => {
            (property_key_name(&p.key) == Some(name)).then_some(&p.value)
        }
        _ => None,
    })
}

/// Object literal bound to `name` inside `obj`, if any.
pub fn find_object_property<'b, 'a>(
    obj: &'b ObjectExpression<'a>,
    name: &str,
) -> Option<&'b ObjectExpression<'a>> {
    match find_property(obj, name).map(unwrap_expression) {
        Some(Expression::ObjectExpression(inner)) => Some(inner),
        _ => None,
    }
}
