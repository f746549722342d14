//! Validator pattern matcher.
//!
//! A route registration may carry its validation middleware anywhere in its
//! argument list, surrounded by arbitrary other middleware, so every argument
//! is inspected. Three call shapes are recognised:
//!
//! 1. `validator({ input, output, stream })`
//! 2. `zValidator('json', Schema)` (any callee whose name ends in "validator")
//! 3. `agent.validator({ ... })` on some binding, usually an imported agent
//!
//! Only bare identifiers are extracted as schema variables. Inline schema
//! expressions still mark the route as validated but have no stable name to
//! reference, so no schema field is set for them.

use oxc_ast::ast::{Argument, CallExpression, Expression, ObjectExpression};
use serde::{Deserialize, Serialize};

use crate::module_scope::ImportMap;
use crate::static_eval::{argument_expression, bool_value, find_property, identifier_name, string_value, unwrap_expression};

const VALIDATOR_NAME: &str = "validator";

/// Request parts a two-argument validator may name.
const REQUEST_TARGETS: [&str; 6] = ["json", "form", "query", "param", "header", "cookie"];

/// The only request-part target whose schema is extracted.
const BODY_TARGET: &str = "json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorMatch {
    pub has_validator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_import_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema_variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema_variable: Option<String>,
    /// `None` when the key is absent, which is distinct from `Some(false)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Scans every argument of a route registration for a validator call. The
/// first recognised validator wins.
pub fn match_validator(arguments: &[Argument<'_>], imports: &ImportMap) -> ValidatorMatch {
    arguments
        .iter()
        .filter_map(argument_expression)
        .find_map(|expr| match expr {
            Expression::CallExpression(call) => match_validator_call(call, imports),
            _ => None,
        })
        .unwrap_or_default()
}

fn match_validator_call(call: &CallExpression<'_>, imports: &ImportMap) -> Option<ValidatorMatch> {
    match unwrap_expression(&call.callee) {
        Expression::Identifier(id) => {
            let local = id.name.as_str();
            // `import { validator as v }` still names the validator.
            let name = imports
                .get(local)
                .and_then(|b| b.imported.as_deref())
                .unwrap_or(local);
            match_bare_call(name, call)
        }
        Expression::StaticMemberExpression(member) if member.property.name == VALIDATOR_NAME => {
            let mut found = options_argument(call)
                .map(extract_options)
                .unwrap_or_else(validated);
            if let Some(variable) = identifier_name(&member.object) {
                found.agent_import_path = imports.source_of(variable).map(str::to_string);
                found.agent_variable = Some(variable.to_string());
            }
            Some(found)
        }
        _ => None,
    }
}

fn match_bare_call(name: &str, call: &CallExpression<'_>) -> Option<ValidatorMatch> {
    if name == VALIDATOR_NAME {
        if let Some(options) = options_argument(call) {
            return Some(extract_options(options));
        }
    }

    if call.arguments.len() != 2 || !name.to_ascii_lowercase().ends_with(VALIDATOR_NAME) {
        return None;
    }
    let target = argument_expression(&call.arguments[0]).and_then(string_value)?;
    if !REQUEST_TARGETS.contains(&target.as_str()) {
        return None;
    }
    let mut found = validated();
    if target == BODY_TARGET {
        found.input_schema_variable = argument_expression(&call.arguments[1])
            .and_then(identifier_name)
            .map(str::to_string);
    }
    Some(found)
}

fn options_argument<'b, 'a>(call: &'b CallExpression<'a>) -> Option<&'b ObjectExpression<'a>> {
    match call.arguments.first().and_then(argument_expression) {
        Some(Expression::ObjectExpression(obj)) => Some(obj),
        _ => None,
    }
}

fn validated() -> ValidatorMatch {
    ValidatorMatch {
        has_validator: true,
        ..Default::default()
    }
}

fn extract_options(options: &ObjectExpression<'_>) -> ValidatorMatch {
    let schema_name = |key: &str| {
        find_property(options, key)
            .and_then(identifier_name)
            .map(str::to_string)
    };
    ValidatorMatch {
        has_validator: true,
        input_schema_variable: schema_name("input"),
        output_schema_variable: schema_name("output"),
        stream: find_property(options, "stream").and_then(bool_value),
        ..Default::default()
    }
}
