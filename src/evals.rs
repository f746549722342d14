//! Eval metadata extractor and mutator.
//!
//! An evals file registers quality checks on an imported agent:
//!
//! ```text
//! import agent from './agent';
//! export const politeness = agent.createEval('politeness', { handler });
//! ```
//!
//! Each registration gets a `metadata` object injected into its config
//! literal. The owning agent's stable id comes from a table of agent files
//! that were already processed, keyed by root-relative filename.

use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Expression, Program};
use oxc_ast::AstBuilder;
use oxc_span::{GetSpan, Span};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::codegen::{metadata_object, object_property_mut, print_statement, set_object_property, splice, upsert_properties};
use crate::error::{Result, ScanError};
use crate::hash::{content_hash, eval_record_id, stable_eval_id};
use crate::module_scope::{binding_init_mut, resolve_relative_import, top_level_bindings, ImportMap};
use crate::options::ScanOptions;
use crate::parse::{line_of, parse_module, source_type_for};
use crate::static_eval::{argument_expression, argument_expression_mut, find_property, string_value, unwrap_expression, unwrap_expression_mut};

pub const EVAL_FACTORY: &str = "createEval";

/// Root-relative agent filename → that agent's stable `agentId`.
pub type AgentIdTable = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRecord {
    pub id: String,
    pub name: String,
    /// Version-independent identity: project, owning agent and name.
    pub identifier: String,
    pub version: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalTransform {
    pub code: String,
    pub evals: Vec<EvalRecord>,
}

/// A located registration, by position so the tree can be mutated after the
/// read-only pass.
struct LocatedEval {
    stmt_index: usize,
    decl_index: usize,
    has_config: bool,
    record: EvalRecord,
}

pub fn extract_evals(
    source: &str,
    filename: &str,
    options: &ScanOptions,
    agents: &AgentIdTable,
) -> Result<EvalTransform> {
    if !source.contains(EVAL_FACTORY) {
        return Ok(EvalTransform {
            code: source.to_string(),
            evals: Vec::new(),
        });
    }

    let allocator = Allocator::default();
    let mut parsed = parse_module(&allocator, source, filename);
    let imports = ImportMap::from_program(&parsed.program);
    let version = content_hash(&[source]);

    let located = locate_evals(&parsed.program, parsed.source, filename, |name, description, receiver| {
        let agent_identifier = resolve_agent(receiver, filename, &imports, agents);
        if agent_identifier.is_none() {
            tracing::warn!(filename, eval = name, agent = receiver, "could not resolve the agent this eval belongs to");
        }
        EvalRecord {
            id: eval_record_id(&options.project_id, &options.deployment_id, filename, name, &version),
            name: name.to_string(),
            identifier: stable_eval_id(
                &options.project_id,
                agent_identifier.as_deref().unwrap_or_default(),
                name,
            ),
            version: version.clone(),
            filename: filename.to_string(),
            description,
            agent_identifier,
        }
    })?;

    let duplicates = duplicate_names(located.iter().map(|e| e.record.name.as_str()));
    if !duplicates.is_empty() {
        return Err(ScanError::DuplicateEvalName {
            filename: filename.to_string(),
            names: duplicates,
        });
    }

    let ast = AstBuilder::new(&allocator);
    let source_type = source_type_for(filename);
    let mut mutated = BTreeSet::new();
    for eval in &located {
        if !eval.has_config {
            tracing::debug!(filename, eval = eval.record.name.as_str(), "no config literal; metadata not injected");
            continue;
        }
        let Some(config) = config_object_mut(&mut parsed.program, eval.stmt_index, eval.decl_index) else {
            continue;
        };
        let entries = metadata_entries(&eval.record);
        match object_property_mut(config, "metadata") {
            Some(metadata) => upsert_properties(ast, metadata, &entries),
            None => set_object_property(ast, config, "metadata", metadata_object(ast, &entries)),
        }
        mutated.insert(eval.stmt_index);
    }

    // One statement may declare several evals; it is printed once, after
    // every one of them has been mutated.
    let edits: Vec<(Span, String)> = mutated
        .into_iter()
        .map(|index| {
            let stmt = &parsed.program.body[index];
            (stmt.span(), print_statement(&allocator, stmt, source_type))
        })
        .collect();

    Ok(EvalTransform {
        code: splice(source, edits),
        evals: located.into_iter().map(|e| e.record).collect(),
    })
}

/// `<receiver>.createEval(...)` call behind an initializer, if that is its shape.
fn eval_call<'b, 'a>(init: &'b Expression<'a>) -> Option<(&'b str, &'b CallExpression<'a>)> {
    let Expression::CallExpression(call) = unwrap_expression(init) else {
        return None;
    };
    let Expression::StaticMemberExpression(member) = unwrap_expression(&call.callee) else {
        return None;
    };
    if member.property.name.as_str() != EVAL_FACTORY {
        return None;
    }
    match unwrap_expression(&member.object) {
        Expression::Identifier(id) => Some((id.name.as_str(), call)),
        _ => None,
    }
}

fn locate_evals(
    program: &Program<'_>,
    source: &str,
    filename: &str,
    mut make_record: impl FnMut(&str, Option<String>, &str) -> EvalRecord,
) -> Result<Vec<LocatedEval>> {
    let mut located = Vec::new();
    for (_, binding) in top_level_bindings(program) {
        if !binding.exported {
            continue;
        }
        let Some((receiver, call)) = binding.init.and_then(eval_call) else {
            continue;
        };
        let name = call
            .arguments
            .first()
            .and_then(argument_expression)
            .and_then(string_value)
            .ok_or_else(|| ScanError::NonLiteralEvalName {
                filename: filename.to_string(),
                line: line_of(source, call.span.start),
            })?;
        let config = match call.arguments.get(1).and_then(argument_expression) {
            Some(Expression::ObjectExpression(obj)) => Some(obj),
            _ => None,
        };
        let description = config
            .and_then(|obj| find_property(obj, "description"))
            .and_then(string_value);

        located.push(LocatedEval {
            stmt_index: binding.stmt_index,
            decl_index: binding.decl_index,
            has_config: config.is_some(),
            record: make_record(&name, description, receiver),
        });
    }
    Ok(located)
}

/// Stable id of the agent bound to `receiver`: an import that resolves to a
/// known agent file, or the current file itself when the agent is declared
/// alongside its evals.
fn resolve_agent(receiver: &str, filename: &str, imports: &ImportMap, agents: &AgentIdTable) -> Option<String> {
    match imports.source_of(receiver) {
        Some(specifier) => resolve_relative_import(filename, specifier)
            .iter()
            .find_map(|candidate| agents.get(candidate))
            .cloned(),
        None => agents.get(filename).cloned(),
    }
}

fn config_object_mut<'b, 'a>(
    program: &'b mut Program<'a>,
    stmt_index: usize,
    decl_index: usize,
) -> Option<&'b mut oxc_ast::ast::ObjectExpression<'a>> {
    let init = binding_init_mut(program, stmt_index, decl_index)?;
    let Expression::CallExpression(call) = unwrap_expression_mut(init) else {
        return None;
    };
    match call.arguments.get_mut(1).and_then(argument_expression_mut) {
        Some(Expression::ObjectExpression(obj)) => Some(&mut **obj),
        _ => None,
    }
}

fn metadata_entries(record: &EvalRecord) -> Vec<(&'static str, &str)> {
    let mut entries: Vec<(&'static str, &str)> = vec![
        ("id", record.id.as_str()),
        ("identifier", record.identifier.as_str()),
        ("version", record.version.as_str()),
        ("filename", record.filename.as_str()),
        ("name", record.name.as_str()),
    ];
    if let Some(agent) = &record.agent_identifier {
        entries.push(("agentIdentifier", agent.as_str()));
    }
    entries
}

/// Every name that occurs more than once, in order of first repetition.
fn duplicate_names<'s>(names: impl Iterator<Item = &'s str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for name in names {
        if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ScanOptions {
        ScanOptions::default().with_project("proj", "dep")
    }

    fn table() -> AgentIdTable {
        let mut t = AgentIdTable::new();
        t.insert("src/agent/chat/agent.ts".to_string(), "agent_abc".to_string());
        t
    }

    #[test]
    fn test_no_factory_token_is_passthrough() {
        let src = "export const x = 1;\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("passthrough");
        assert_eq!(out.code, src);
        assert!(out.evals.is_empty());
    }

    #[test]
    fn test_injects_metadata_and_resolves_agent() {
        let src = "import agent from './agent';\n// leading comment\nexport const polite = agent.createEval('polite', { description: 'Is it polite?', handler: async () => true });\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("evals");
        assert_eq!(out.evals.len(), 1);
        let eval = &out.evals[0];
        assert_eq!(eval.name, "polite");
        assert_eq!(eval.description.as_deref(), Some("Is it polite?"));
        assert_eq!(eval.agent_identifier.as_deref(), Some("agent_abc"));
        assert_eq!(eval.identifier, stable_eval_id("proj", "agent_abc", "polite"));
        assert!(eval.id.starts_with("evalid_"));

        assert!(out.code.starts_with("import agent from './agent';\n// leading comment\n"));
        assert!(out.code.contains("metadata"), "got: {}", out.code);
        assert!(out.code.contains(&eval.identifier), "got: {}", out.code);
        assert!(out.code.contains("agentIdentifier"), "got: {}", out.code);
    }

    #[test]
    fn test_identifier_survives_content_edits() {
        let a = "import agent from './agent';\nexport const e = agent.createEval('e', {});\n";
        let b = "import agent from './agent';\n\nexport const e = agent.createEval('e', { description: 'x' });\n";
        let ea = &extract_evals(a, "src/agent/chat/eval.ts", &opts(), &table()).expect("a").evals[0];
        let eb = &extract_evals(b, "src/agent/chat/eval.ts", &opts(), &table()).expect("b").evals[0];
        assert_eq!(ea.identifier, eb.identifier);
        assert_ne!(ea.id, eb.id);
        assert_ne!(ea.version, eb.version);
    }

    #[test]
    fn test_non_literal_name_is_rejected() {
        let src = "import agent from './agent';\nconst n = 'x';\nexport const e = agent.createEval(n, {});\n";
        let err = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).unwrap_err();
        assert!(matches!(err, ScanError::NonLiteralEvalName { line: 3, .. }), "got: {:?}", err);
    }

    #[test]
    fn test_duplicate_names_are_aggregated() {
        let src = "import agent from './agent';\nexport const a = agent.createEval('same', {});\nexport const b = agent.createEval('same', {});\nexport const c = agent.createEval('other', {});\n";
        let err = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).unwrap_err();
        match err {
            ScanError::DuplicateEvalName { names, .. } => assert_eq!(names, vec!["same".to_string()]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_agent_still_records_eval() {
        let src = "import agent from '../elsewhere/agent';\nexport const e = agent.createEval('e', {});\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("evals");
        assert_eq!(out.evals[0].agent_identifier, None);
        assert!(!out.code.contains("agentIdentifier"));
    }

    #[test]
    fn test_existing_metadata_is_augmented() {
        let src = "import agent from './agent';\nexport const e = agent.createEval('e', { metadata: { owner: 'qa' } });\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("evals");
        assert!(out.code.contains("owner"), "got: {}", out.code);
        assert_eq!(out.code.matches("metadata").count(), 1, "got: {}", out.code);
    }

    #[test]
    fn test_every_declarator_in_one_statement_gets_metadata() {
        let src = "import agent from './agent';\nexport const a = agent.createEval('a', {}), b = agent.createEval('b', {});\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("evals");
        assert_eq!(out.evals.len(), 2);
        assert_eq!(out.code.matches("metadata").count(), 2, "got: {}", out.code);
        for eval in &out.evals {
            assert!(out.code.contains(&eval.identifier), "missing {} in: {}", eval.name, out.code);
        }
        assert_eq!(out.code.matches("export const").count(), 1, "statement printed twice: {}", out.code);
    }

    #[test]
    fn test_non_object_metadata_is_replaced() {
        let src = "import agent from './agent';\nconst shared = { owner: 'qa' };\nexport const e = agent.createEval('e', { metadata: shared });\n";
        let out = extract_evals(src, "src/agent/chat/eval.ts", &opts(), &table()).expect("evals");
        assert_eq!(out.code.matches("metadata").count(), 1, "got: {}", out.code);
        assert!(!out.code.contains("metadata: shared"), "got: {}", out.code);
        assert!(out.code.contains(&out.evals[0].identifier), "got: {}", out.code);
    }
}
