//! Agent metadata extractor and mutator.
//!
//! An agent file default-exports one factory call:
//!
//! ```text
//! export default createAgent('support', {
//!     schema: { input: z.object({ q: z.string() }), output: z.string() },
//!     handler: async (ctx, input) => { ... },
//! });
//! ```
//!
//! The call may also be bound to a variable that is exported as default.
//! Generated identity fields are written into the config's `metadata`
//! object, which is created from the factory's name argument when absent.
//! A sibling evals file in the same directory is processed in the same pass
//! so its evals pick up this agent's stable id.

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Expression, ObjectExpression, Program, Statement};
use oxc_ast::AstBuilder;
use oxc_span::GetSpan;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;

use crate::codegen::{metadata_object, object_property_mut, print_expression, print_statement, set_object_property, splice, upsert_properties};
use crate::error::{Result, ScanError};
use crate::evals::{extract_evals, AgentIdTable, EvalRecord, EvalTransform};
use crate::hash::{agent_record_id, content_hash, stable_agent_id};
use crate::module_scope::{binding_init_mut, find_binding, find_default_export, parent_dir, DefaultExport, ImportMap};
use crate::options::ScanOptions;
use crate::parse::{line_of, parse_module, source_type_for, ParsedModule};
use crate::static_eval::{argument_expression, argument_expression_mut, find_object_property, find_property, string_value, unwrap_expression, unwrap_expression_mut};

pub const AGENT_FACTORY: &str = "createAgent";

/// Sibling evals file names, in lookup order.
pub const EVAL_FILENAMES: [&str; 4] = ["eval.ts", "evals.ts", "eval.js", "evals.js"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    /// Stable across content edits: project and name only.
    pub agent_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evals: Option<Vec<EvalRecord>>,
}

impl AgentRecord {
    /// Ordered string map handed to the host.
    pub fn metadata(&self) -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert("id".to_string(), self.id.clone());
        map.insert("agentId".to_string(), self.agent_id.clone());
        map.insert("version".to_string(), self.version.clone());
        map.insert("name".to_string(), self.name.clone());
        map.insert("filename".to_string(), self.filename.clone());
        if let Some(description) = &self.description {
            map.insert("description".to_string(), description.clone());
        }
        if let Some(code) = &self.input_schema_code {
            map.insert("inputSchemaCode".to_string(), code.clone());
        }
        if let Some(code) = &self.output_schema_code {
            map.insert("outputSchemaCode".to_string(), code.clone());
        }
        if let Some(evals) = &self.evals {
            // Serializing plain string records cannot fail.
            let json = serde_json::to_string(evals).unwrap_or_default();
            map.insert("evals".to_string(), json);
        }
        map
    }
}

/// Regenerated evals file that belongs to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingEvals {
    pub filename: String,
    #[serde(flatten)]
    pub transform: EvalTransform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentTransform {
    pub code: String,
    pub metadata: IndexMap<String, String>,
    pub record: AgentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evals: Option<SiblingEvals>,
}

/// Where the factory call lives.
#[derive(Debug, Clone, Copy)]
enum CallSite {
    /// `export default createAgent(...)`
    DefaultExport { stmt_index: usize },
    /// `const agent = createAgent(...); export default agent;`
    Binding { stmt_index: usize, decl_index: usize },
}

impl CallSite {
    fn stmt_index(&self) -> usize {
        match self {
            CallSite::DefaultExport { stmt_index } | CallSite::Binding { stmt_index, .. } => *stmt_index,
        }
    }
}

/// Facts read from the tree before it is mutated.
struct AgentFacts {
    site: CallSite,
    /// Line of the factory call.
    line: u32,
    name: String,
    description: Option<String>,
    has_metadata: bool,
    input_schema_code: Option<String>,
    output_schema_code: Option<String>,
}

impl AgentFacts {
    fn invalid(&self, filename: &str, message: &str) -> ScanError {
        ScanError::InvalidAgentDeclaration {
            filename: filename.to_string(),
            line: self.line,
            message: message.to_string(),
        }
    }
}

/// Processes an agent file. Files without the factory token are not agent
/// files and yield `None`.
pub fn extract_agent(source: &str, filename: &str, options: &ScanOptions) -> Result<Option<AgentTransform>> {
    if !source.contains(AGENT_FACTORY) {
        tracing::debug!(filename, "no agent factory call; not an agent file");
        return Ok(None);
    }

    let allocator = Allocator::default();
    let mut parsed = parse_module(&allocator, source, filename);
    let facts = read_agent(&allocator, &parsed, filename)?;

    let version = content_hash(&[source]);
    let agent_id = stable_agent_id(&options.project_id, &facts.name);
    let mut record = AgentRecord {
        id: agent_record_id(&options.project_id, &options.deployment_id, filename, &version),
        agent_id: agent_id.clone(),
        name: facts.name.clone(),
        description: facts.description.clone(),
        version,
        filename: filename.to_string(),
        input_schema_code: facts.input_schema_code.clone(),
        output_schema_code: facts.output_schema_code.clone(),
        evals: None,
    };

    let ast = AstBuilder::new(&allocator);
    let mut entries: Vec<(&'static str, &str)> = vec![
        ("id", record.id.as_str()),
        ("agentId", record.agent_id.as_str()),
        ("version", record.version.as_str()),
        ("filename", record.filename.as_str()),
    ];
    if let Some(description) = &record.description {
        entries.push(("description", description.as_str()));
    }
    if let Some(code) = &record.input_schema_code {
        entries.push(("inputSchemaCode", code.as_str()));
    }
    if let Some(code) = &record.output_schema_code {
        entries.push(("outputSchemaCode", code.as_str()));
    }

    let config = config_object_mut(&mut parsed.program, facts.site)
        .ok_or_else(|| facts.invalid(filename, "agent configuration changed shape while rewriting"))?;
    if facts.has_metadata {
        if let Some(metadata) = object_property_mut(config, "metadata") {
            upsert_properties(ast, metadata, &entries);
        }
    } else {
        entries.insert(3, ("name", record.name.as_str()));
        set_object_property(ast, config, "metadata", metadata_object(ast, &entries));
    }

    let stmt = &parsed.program.body[facts.site.stmt_index()];
    let printed = print_statement(&allocator, stmt, source_type_for(filename));
    let code = splice(source, vec![(stmt.span(), printed)]);

    let evals = sibling_evals(filename, &agent_id, options)?;
    if let Some(sibling) = &evals {
        record.evals = Some(sibling.transform.evals.clone());
    }

    Ok(Some(AgentTransform {
        code,
        metadata: record.metadata(),
        record,
        evals,
    }))
}

fn is_agent_factory(call: &CallExpression<'_>, imports: &ImportMap) -> bool {
    match unwrap_expression(&call.callee) {
        Expression::Identifier(id) => {
            let local = id.name.as_str();
            local == AGENT_FACTORY
                || imports
                    .get(local)
                    .and_then(|b| b.imported.as_deref())
                    .is_some_and(|imported| imported == AGENT_FACTORY)
        }
        _ => false,
    }
}

fn read_agent<'a>(allocator: &'a Allocator, parsed: &ParsedModule<'a>, filename: &str) -> Result<AgentFacts> {
    let program = &parsed.program;
    let invalid = |offset: u32, message: String| ScanError::InvalidAgentDeclaration {
        filename: filename.to_string(),
        line: line_of(parsed.source, offset),
        message,
    };
    let imports = ImportMap::from_program(program);

    let Some(export) = find_default_export(program) else {
        return Err(invalid(0, format!("agent file must `export default` a `{}(...)` call", AGENT_FACTORY)));
    };
    let (site, init, offset) = match export {
        DefaultExport::Expression { expr, stmt_index, span } => {
            (CallSite::DefaultExport { stmt_index }, Some(expr), span.start)
        }
        DefaultExport::Identifier { name, span } => match find_binding(program, name) {
            Some(binding) => (
                CallSite::Binding {
                    stmt_index: binding.stmt_index,
                    decl_index: binding.decl_index,
                },
                binding.init,
                binding.span.start,
            ),
            None => {
                return Err(invalid(
                    span.start,
                    format!("default export `{}` is not declared at the top level of the module", name),
                ))
            }
        },
        DefaultExport::Declaration { span } => {
            return Err(invalid(
                span.start,
                format!("default export must be a `{}(...)` call", AGENT_FACTORY),
            ))
        }
    };

    let call = match init.map(unwrap_expression) {
        Some(Expression::CallExpression(call)) if is_agent_factory(call, &imports) => call,
        _ => {
            return Err(invalid(
                offset,
                format!("default export must be a `{}(...)` call", AGENT_FACTORY),
            ))
        }
    };
    let line_offset = call.span.start;
    if call.arguments.len() != 2 {
        return Err(invalid(
            line_offset,
            format!("`{}` takes a name and a configuration object, got {} argument(s)", AGENT_FACTORY, call.arguments.len()),
        ));
    }
    let name = argument_expression(&call.arguments[0])
        .and_then(string_value)
        .ok_or_else(|| invalid(line_offset, "agent name must be a string literal".to_string()))?;
    let config = match argument_expression(&call.arguments[1]) {
        Some(Expression::ObjectExpression(obj)) => obj,
        _ => return Err(invalid(line_offset, "agent configuration must be an object literal".to_string())),
    };

    let (name, has_metadata, metadata_description) = match find_property(config, "metadata").map(unwrap_expression) {
        Some(Expression::ObjectExpression(metadata)) => {
            let declared = find_property(metadata, "name")
                .and_then(string_value)
                .ok_or_else(|| ScanError::MissingAgentName {
                    filename: filename.to_string(),
                    line: line_of(parsed.source, metadata.span.start),
                })?;
            let description = find_property(metadata, "description").and_then(string_value);
            (declared, true, description)
        }
        Some(other) => {
            return Err(invalid(other.span().start, "`metadata` must be an object literal".to_string()));
        }
        None => (name, false, None),
    };
    let description = metadata_description.or_else(|| find_property(config, "description").and_then(string_value));

    let source_type = source_type_for(filename);
    let schema_code = |key: &str| {
        find_object_property(config, "schema")
            .and_then(|schema| find_property(schema, key))
            .map(|expr| print_expression(allocator, expr, source_type))
    };

    Ok(AgentFacts {
        site,
        line: line_of(parsed.source, line_offset),
        name,
        description,
        has_metadata,
        input_schema_code: schema_code("input"),
        output_schema_code: schema_code("output"),
    })
}

fn config_object_mut<'b, 'a>(program: &'b mut Program<'a>, site: CallSite) -> Option<&'b mut ObjectExpression<'a>> {
    let init = match site {
        CallSite::DefaultExport { stmt_index } => match program.body.get_mut(stmt_index)? {
            Statement::ExportDefaultDeclaration(decl) => decl.declaration.as_expression_mut()?,
            _ => return None,
        },
        CallSite::Binding { stmt_index, decl_index } => binding_init_mut(program, stmt_index, decl_index)?,
    };
    let Expression::CallExpression(call) = unwrap_expression_mut(init) else {
        return None;
    };
    match call.arguments.get_mut(1).and_then(argument_expression_mut) {
        Some(Expression::ObjectExpression(obj)) => Some(&mut **obj),
        _ => None,
    }
}

/// Runs the eval extractor over the first sibling evals file that exists.
fn sibling_evals(filename: &str, agent_id: &str, options: &ScanOptions) -> Result<Option<SiblingEvals>> {
    let dir = parent_dir(filename);
    for candidate in EVAL_FILENAMES {
        let eval_filename = if dir.is_empty() {
            candidate.to_string()
        } else {
            format!("{}/{}", dir, candidate)
        };
        let source = match fs::read_to_string(options.resolve(&eval_filename)) {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(ScanError::Io {
                    filename: eval_filename,
                    source,
                })
            }
        };

        let mut table = AgentIdTable::new();
        table.insert(filename.to_string(), agent_id.to_string());
        let transform = extract_evals(&source, &eval_filename, options, &table)?;
        tracing::debug!(filename, evals = transform.evals.len(), sibling = eval_filename.as_str(), "processed sibling evals");
        return Ok(Some(SiblingEvals {
            filename: eval_filename,
            transform,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ScanOptions {
        ScanOptions::new("/nonexistent-scan-root").with_project("proj", "dep")
    }

    #[test]
    fn test_not_an_agent_file() {
        let out = extract_agent("export const x = 1;\n", "src/agent/x/agent.ts", &opts()).expect("ok");
        assert!(out.is_none());
    }

    #[test]
    fn test_synthesizes_metadata() {
        let src = "import { createAgent } from '@agentuity/runtime';\nexport default createAgent('support', {\n  description: 'Answers questions',\n  handler: async () => 'ok',\n});\n";
        let out = extract_agent(src, "src/agent/support/agent.ts", &opts())
            .expect("agent")
            .expect("is an agent file");
        assert_eq!(out.record.name, "support");
        assert_eq!(out.record.agent_id, stable_agent_id("proj", "support"));
        assert_eq!(out.record.description.as_deref(), Some("Answers questions"));
        assert!(out.record.evals.is_none());

        let keys: Vec<&str> = out.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "agentId", "version", "name", "filename", "description"]);

        assert!(out.code.starts_with("import { createAgent } from '@agentuity/runtime';\n"));
        assert!(out.code.contains("metadata"), "got: {}", out.code);
        assert!(out.code.contains(&out.record.agent_id), "got: {}", out.code);
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let src = "export default createAgent({ handler });\n";
        let err = extract_agent(src, "src/agent/a/agent.ts", &opts()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAgentDeclaration { line: 1, .. }), "got: {:?}", err);
    }

    #[test]
    fn test_metadata_without_name_is_rejected() {
        let src = "const agent = createAgent('a', {\n  metadata: { description: 'x' },\n});\nexport default agent;\n";
        let err = extract_agent(src, "src/agent/a/agent.ts", &opts()).unwrap_err();
        assert!(matches!(err, ScanError::MissingAgentName { line: 2, .. }), "got: {:?}", err);
    }

    #[test]
    fn test_rewrite_errors_point_at_the_factory_call() {
        let allocator = Allocator::default();
        let src = "import { createAgent } from '@agentuity/runtime';\n\nconst agent = createAgent('a', {});\nexport default agent;\n";
        let parsed = parse_module(&allocator, src, "agent.ts");
        let facts = read_agent(&allocator, &parsed, "src/agent/a/agent.ts").expect("facts");
        assert_eq!(facts.line, 3);
        let err = facts.invalid("src/agent/a/agent.ts", "changed shape");
        assert_eq!(err.line(), Some(3));
    }
}
