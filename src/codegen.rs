//! Codegen module for the scanner
//!
//! Serializes mutated statements back to source and builds the metadata
//! nodes the agent and eval mutators inject. Mutated statements are spliced
//! into the original text at their spans, so code the tolerant parser had to
//! drop and every untouched comment survive regeneration.

use oxc_allocator::{Allocator, CloneIn};
use oxc_ast::{ast::*, AstBuilder};
use oxc_codegen::Codegen;
use oxc_span::{SourceType, Span, SPAN};

use crate::static_eval::{property_key_name, unwrap_expression};

// ═══════════════════════════════════════════════════════════════════════════════
// PRINTING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_program(program: &Program<'_>) -> String {
    Codegen::new().build(program).code
}

fn standalone_program<'a>(
    allocator: &'a Allocator,
    stmt: Statement<'a>,
    source_type: SourceType,
) -> Program<'a> {
    let ast = AstBuilder::new(allocator);
    Program {
        span: SPAN,
        source_type,
        hashbang: None,
        directives: ast.vec(),
        body: {
            let mut b = ast.vec();
            b.push(stmt);
            b
        },
        source_text: "",
        comments: ast.vec(),
        scope_id: std::cell::Cell::new(None),
    }
}

/// Source of one top-level statement, printed on its own.
pub fn print_statement<'a>(
    allocator: &'a Allocator,
    stmt: &Statement<'a>,
    source_type: SourceType,
) -> String {
    let program = standalone_program(allocator, stmt.clone_in(allocator), source_type);
    print_program(&program).trim_end().to_string()
}

/// Pretty-printed source of a single expression, without the trailing
/// semicolon of the statement it is printed through.
pub fn print_expression<'a>(
    allocator: &'a Allocator,
    expr: &Expression<'a>,
    source_type: SourceType,
) -> String {
    let ast = AstBuilder::new(allocator);
    let stmt = ast.statement_expression(SPAN, expr.clone_in(allocator));
    let code = print_program(&standalone_program(allocator, stmt, source_type));
    let code = code.trim_end().trim_end_matches(';').trim_end();

    // Expression statements may not start with `{`, `function` or `class`,
    // so the printer parenthesises those; the expression itself needs none.
    let statement_wrapped = matches!(
        unwrap_expression(expr),
        Expression::ObjectExpression(_)
            | Expression::FunctionExpression(_)
            | Expression::ClassExpression(_)
    ) && !matches!(expr, Expression::ParenthesizedExpression(_));
    if statement_wrapped && code.starts_with('(') && code.ends_with(')') {
        return code[1..code.len() - 1].trim().to_string();
    }
    code.to_string()
}

/// Replaces each span of `source` with its printed statement. Everything
/// outside the spans is kept byte for byte.
pub fn splice(source: &str, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for (span, text) in edits {
        let (start, end) = (span.start as usize, span.end as usize);
        if start < cursor || end > source.len() {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA NODES
// ═══════════════════════════════════════════════════════════════════════════════

fn value_expression<'a>(ast: AstBuilder<'a>, value: &str) -> Expression<'a> {
    let atom = ast.allocator.alloc_str(value);
    ast.expression_string_literal(SPAN, atom, None)
}

fn property<'a>(ast: AstBuilder<'a>, key: &str, value: Expression<'a>) -> ObjectPropertyKind<'a> {
    let key_atom = ast.allocator.alloc_str(key);
    ast.object_property_kind_object_property(
        SPAN,
        PropertyKind::Init,
        PropertyKey::StaticIdentifier(ast.alloc(ast.identifier_name(SPAN, key_atom))),
        value,
        false,
        false,
        false,
    )
}

/// `{ key: value, ... }` in entry order.
pub fn metadata_object<'a>(ast: AstBuilder<'a>, entries: &[(&str, &str)]) -> Expression<'a> {
    let mut props = ast.vec();
    for (key, value) in entries {
        props.push(property(ast, key, value_expression(ast, value)));
    }
    ast.expression_object(SPAN, props)
}

/// Sets each entry on `obj`: an existing plain property with the same key has
/// its value replaced, otherwise the property is appended.
pub fn upsert_properties<'a>(
    ast: AstBuilder<'a>,
    obj: &mut ObjectExpression<'a>,
    entries: &[(&str, &str)],
) {
    for (key, value) in entries {
        set_object_property(ast, obj, key, value_expression(ast, value));
    }
}

/// Mutable object literal bound to `key` inside `obj`.
pub fn object_property_mut<'b, 'a>(
    obj: &'b mut ObjectExpression<'a>,
    key: &str,
) -> Option<&'b mut ObjectExpression<'a>> {
    obj.properties.iter_mut().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p)
            if !p.computed && property_key_name(&p.key) == Some(key) =>
        {
            match &mut p.value {
                Expression::ObjectExpression(inner) => Some(&mut **inner),
                _ => None,
            }
        }
        _ => None,
    })
}

/// Sets `key: value` on `obj`, replacing the value of an existing plain
/// property with that key or appending a new one.
pub fn set_object_property<'a>(
    ast: AstBuilder<'a>,
    obj: &mut ObjectExpression<'a>,
    key: &str,
    value: Expression<'a>,
) {
    let existing = obj.properties.iter_mut().find_map(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(p)
            if !p.computed && property_key_name(&p.key) == Some(key) =>
        {
            Some(p)
        }
        _ => None,
    });
    match existing {
        Some(p) => {
            p.value = value;
            p.shorthand = false;
        }
        None => obj.properties.push(property(ast, key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_parser::Parser;

    fn ts() -> SourceType {
        SourceType::default().with_module(true).with_typescript(true)
    }

    #[test]
    fn test_print_expression_strips_statement_parens() {
        let allocator = Allocator::default();
        let expr = Parser::new(&allocator, "{ name: s.string() }", ts())
            .parse_expression()
            .expect("object literal");
        let printed = print_expression(&allocator, &expr, ts());
        assert!(printed.starts_with('{'), "got: {}", printed);
        assert!(printed.contains("name: s.string()"), "got: {}", printed);
        assert!(!printed.ends_with(';'));
    }

    #[test]
    fn test_print_call_expression() {
        let allocator = Allocator::default();
        let expr = Parser::new(&allocator, "z.object({a: z.string()})", ts())
            .parse_expression()
            .expect("call");
        let printed = print_expression(&allocator, &expr, ts());
        assert!(printed.starts_with("z.object("), "got: {}", printed);
        assert!(printed.contains("a: z.string()"), "got: {}", printed);
    }

    #[test]
    fn test_upsert_replaces_and_appends() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let src = "const x = { name: 'a', version: 'old' };";
        let mut ret = Parser::new(&allocator, src, ts()).parse();
        if let Some(Statement::VariableDeclaration(var)) = ret.program.body.first_mut() {
            if let Some(Expression::ObjectExpression(obj)) = &mut var.declarations[0].init {
                upsert_properties(
                    ast,
                    obj,
                    &[("version", "new"), ("id", "abc")],
                );
            }
        }
        let code = print_program(&ret.program);
        assert!(code.contains("version: \"new\""), "got: {}", code);
        assert!(!code.contains("old"), "got: {}", code);
        assert!(code.contains("id: \"abc\""), "got: {}", code);
    }

    #[test]
    fn test_splice_keeps_surrounding_text() {
        let src = "// keep me\nconst a = 1;\nconst b = 2; // and me\n";
        let edits = vec![(Span::new(11, 23), "const a = 42;".to_string())];
        assert_eq!(splice(src, edits), "// keep me\nconst a = 42;\nconst b = 2; // and me\n");
    }

    #[test]
    fn test_print_statement_after_mutation() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let mut ret = Parser::new(&allocator, "export const e = a.createEval('x', {});", ts()).parse();
        if let Some(Statement::ExportNamedDeclaration(decl)) = ret.program.body.first_mut() {
            if let Some(Declaration::VariableDeclaration(var)) = &mut decl.declaration {
                if let Some(Expression::CallExpression(call)) = &mut var.declarations[0].init {
                    if let Some(Argument::ObjectExpression(obj)) = call.arguments.get_mut(1) {
                        let meta = metadata_object(ast, &[("name", "x")]);
                        set_object_property(ast, obj, "metadata", meta);
                    }
                }
            }
        }
        let printed = print_statement(&allocator, &ret.program.body[0], ts());
        assert!(printed.starts_with("export const e"), "got: {}", printed);
        assert!(printed.contains("metadata"), "got: {}", printed);
        assert!(Parser::new(&allocator, &printed, ts()).parse().errors.is_empty());
    }

    #[test]
    fn test_metadata_object_round_trips() {
        let allocator = Allocator::default();
        let ast = AstBuilder::new(&allocator);
        let obj = metadata_object(ast, &[("name", "chat"), ("id", "agentid_1")]);
        let printed = print_expression(&allocator, &obj, ts());
        let reparsed = Parser::new(&allocator, &printed, ts()).parse_expression();
        assert!(reparsed.is_ok(), "not re-parseable: {}", printed);
        assert!(printed.contains("name: \"chat\""));
    }
}
