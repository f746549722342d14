//! Route extractor.
//!
//! A route file default-exports a router variable built by `createRouter()`
//! (or `new Hono()`) and registers handlers on it with top-level calls:
//!
//! ```text
//! const router = createRouter();
//! router.post('/items', validator({ output: Out }), handler);
//! router.cron('0 * * * *', job);
//! export default router;
//! ```
//!
//! Each registration becomes one `RouteRecord` mounted under
//! `{mountRoot}/{prefix}/{suffix}`, where the prefix is the file's directory
//! below the API root.

use croner::Cron;
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Expression, ObjectPropertyKind, Program, Statement};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{DispatchPanic, Result, ScanError};
use crate::hash::{content_hash, route_id, stable_hash};
use crate::module_scope::{find_binding, find_default_export, parent_dir, DefaultExport, ImportMap};
use crate::options::ScanOptions;
use crate::parse::{line_of, parse_module};
use crate::static_eval::{argument_expression, literal_json, property_key_name, string_value, unwrap_expression};
use crate::validator::{match_validator, ValidatorMatch};

const ROUTER_FACTORY: &str = "createRouter";
const ROUTER_CLASS: &str = "Hono";

/// Router methods that register middleware or sub-routers rather than routes.
const IGNORED_METHODS: [&str; 8] = [
    "use", "route", "mount", "on", "all", "basePath", "onError", "notFound",
];

lazy_static! {
    static ref REPEATED_SLASHES: Regex = Regex::new(r"/{2,}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORD TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl RouteMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get" => Some(RouteMethod::Get),
            "put" => Some(RouteMethod::Put),
            "post" => Some(RouteMethod::Post),
            "patch" => Some(RouteMethod::Patch),
            "delete" => Some(RouteMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Put => "put",
            RouteMethod::Post => "post",
            RouteMethod::Patch => "patch",
            RouteMethod::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Api,
    Sms,
    Email,
    Cron,
    Websocket,
    Sse,
    Stream,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Api => "api",
            RouteType::Sms => "sms",
            RouteType::Email => "email",
            RouteType::Cron => "cron",
            RouteType::Websocket => "websocket",
            RouteType::Sse => "sse",
            RouteType::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteConfig {
    #[serde(flatten)]
    pub validator: ValidatorMatch,
    /// Type-specific fields: literal sms options, the cron `expression`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub method: RouteMethod,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub filename: String,
    pub path: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RouteConfig>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Extracts every route registered in a route file, in source order.
///
/// A file that never constructs a router is not a route file and yields an
/// empty list.
pub fn extract_routes(source: &str, filename: &str, options: &ScanOptions) -> Result<Vec<RouteRecord>> {
    if !source.contains(ROUTER_FACTORY) && !source.contains(ROUTER_CLASS) {
        tracing::debug!(filename, "no router construction; not a route file");
        return Ok(Vec::new());
    }

    let allocator = Allocator::default();
    let parsed = parse_module(&allocator, source, filename);
    let imports = ImportMap::from_program(&parsed.program);
    let router = resolve_router(&parsed.program, parsed.source, filename, &imports)?;

    let ctx = RouteContext {
        filename,
        source: parsed.source,
        options,
        imports: &imports,
        prefix: route_prefix(filename, &options.api_dir),
        version: content_hash(&[source]),
    };

    let mut routes = Vec::new();
    for stmt in &parsed.program.body {
        let Statement::ExpressionStatement(es) = stmt else {
            continue;
        };
        let Expression::CallExpression(call) = unwrap_expression(&es.expression) else {
            continue;
        };
        let Some(chain) = router_call_chain(call, router) else {
            continue;
        };
        for (method, call) in chain {
            let line = line_of(ctx.source, call.span.start);
            if let Some(route) = guard_panics(filename, line, method, || ctx.dispatch(method, call))? {
                routes.push(route);
            }
        }
    }
    Ok(routes)
}

/// Runs one registration, reporting a panic inside it (a third-party parser
/// included) as an `InvalidRouterArgument` with the panic message as cause.
fn guard_panics<T>(filename: &str, line: u32, method: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("unknown panic");
        tracing::error!(filename, line, method, panic = message, "router call handler panicked");
        Err(ScanError::InvalidRouterArgument {
            filename: filename.to_string(),
            line,
            method: method.to_string(),
            message: "unexpected failure while reading the call".to_string(),
            source: Some(Box::new(DispatchPanic(message.to_string()))),
        })
    })
}

fn is_router_construction(expr: &Expression<'_>, imports: &ImportMap) -> bool {
    let imported_as = |local: &str, name: &str| {
        local == name
            || imports
                .get(local)
                .and_then(|b| b.imported.as_deref())
                .is_some_and(|imported| imported == name)
    };
    match unwrap_expression(expr) {
        Expression::CallExpression(call) => match unwrap_expression(&call.callee) {
            Expression::Identifier(id) => imported_as(id.name.as_str(), ROUTER_FACTORY),
            _ => false,
        },
        Expression::NewExpression(new_expr) => match unwrap_expression(&new_expr.callee) {
            Expression::Identifier(id) => imported_as(id.name.as_str(), ROUTER_CLASS),
            _ => false,
        },
        _ => false,
    }
}

/// Name of the router variable the file default-exports.
fn resolve_router<'b>(
    program: &'b Program<'_>,
    source: &str,
    filename: &str,
    imports: &ImportMap,
) -> Result<&'b str> {
    let invalid = |offset: u32, message: &str| ScanError::InvalidRouterDeclaration {
        filename: filename.to_string(),
        line: line_of(source, offset),
        message: message.to_string(),
    };

    let export = find_default_export(program).ok_or_else(|| ScanError::MissingDefaultExport {
        filename: filename.to_string(),
    })?;
    let export_span = export.span();
    let name = match export {
        DefaultExport::Identifier { name, .. } => name,
        other => {
            return Err(invalid(
                other.span().start,
                "default export must be a variable holding the router",
            ))
        }
    };

    let binding = find_binding(program, name).ok_or_else(|| {
        invalid(
            export_span.start,
            &format!("`{}` is not declared at the top level of the module", name),
        )
    })?;
    match binding.init {
        Some(init) if is_router_construction(init, imports) => Ok(name),
        _ => Err(invalid(
            binding.span.start,
            &format!(
                "`{}` must be initialized with `{}()` or `new {}()`",
                name, ROUTER_FACTORY, ROUTER_CLASS
            ),
        )),
    }
}

/// Flattens `router.a(..).b(..)` into `[("a", call), ("b", call)]` when the
/// chain is rooted at the router variable.
fn router_call_chain<'b, 'a>(
    outer: &'b CallExpression<'a>,
    router: &str,
) -> Option<Vec<(&'b str, &'b CallExpression<'a>)>> {
    let mut chain = Vec::new();
    let mut call = outer;
    loop {
        let Expression::StaticMemberExpression(member) = unwrap_expression(&call.callee) else {
            return None;
        };
        chain.push((member.property.name.as_str(), call));
        match unwrap_expression(&member.object) {
            Expression::Identifier(id) if id.name.as_str() == router => break,
            Expression::CallExpression(inner) => call = inner,
            _ => return None,
        }
    }
    chain.reverse();
    Some(chain)
}

/// Directory of `filename` below the API root, `""` for files directly
/// under it or outside it.
fn route_prefix(filename: &str, api_dir: &str) -> String {
    let api_dir = api_dir.trim_matches('/');
    let relative = if api_dir.is_empty() {
        Some(filename)
    } else {
        filename
            .strip_prefix(api_dir)
            .and_then(|rest| rest.strip_prefix('/'))
    };
    relative.map(|r| parent_dir(r).to_string()).unwrap_or_default()
}

/// Joins mount segments, collapsing repeated separators and dropping a
/// trailing one.
pub fn normalize_path(path: &str) -> String {
    let collapsed = REPEATED_SLASHES.replace_all(path, "/");
    let trimmed = collapsed.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

struct RouteContext<'c> {
    filename: &'c str,
    source: &'c str,
    options: &'c ScanOptions,
    imports: &'c ImportMap,
    prefix: String,
    version: String,
}

/// What a single registration call resolves to before ids are assigned.
struct Registration {
    method: RouteMethod,
    route_type: RouteType,
    suffix: String,
    extra: BTreeMap<String, serde_json::Value>,
}

impl Registration {
    fn new(method: RouteMethod, route_type: RouteType, suffix: String) -> Self {
        Registration {
            method,
            route_type,
            suffix,
            extra: BTreeMap::new(),
        }
    }
}

impl RouteContext<'_> {
    fn dispatch(&self, method: &str, call: &CallExpression<'_>) -> Result<Option<RouteRecord>> {
        let line = line_of(self.source, call.span.start);
        let registration = match method {
            m if IGNORED_METHODS.contains(&m) => {
                tracing::debug!(filename = self.filename, line, method = m, "skipping router call");
                return Ok(None);
            }
            "stream" | "sse" | "websocket" => {
                let route_type = match method {
                    "stream" => RouteType::Stream,
                    "sse" => RouteType::Sse,
                    _ => RouteType::Websocket,
                };
                let path = self.string_argument(call, line, method, "a string literal path")?;
                Registration::new(RouteMethod::Post, route_type, path)
            }
            "sms" => self.sms(call, line)?,
            "email" => {
                let address = self.string_argument(call, line, method, "a string literal address")?;
                Registration::new(RouteMethod::Post, RouteType::Email, stable_hash(&[address.as_str()]))
            }
            "cron" => self.cron(call, line)?,
            other => match RouteMethod::from_name(other) {
                Some(verb) => {
                    let path = self.string_argument(call, line, method, "a string literal path")?;
                    Registration::new(verb, RouteType::Api, path)
                }
                None => {
                    return Err(ScanError::UnsupportedRouterMethod {
                        filename: self.filename.to_string(),
                        line,
                        method: other.to_string(),
                    })
                }
            },
        };

        let path = normalize_path(&format!(
            "{}/{}/{}",
            self.options.mount_root, self.prefix, registration.suffix
        ));
        let validator = match_validator(&call.arguments, self.imports);
        let config = (validator.has_validator || !registration.extra.is_empty()).then(|| RouteConfig {
            validator,
            extra: registration.extra,
        });

        Ok(Some(RouteRecord {
            id: route_id(
                &self.options.project_id,
                &self.options.deployment_id,
                registration.route_type.as_str(),
                registration.method.as_str(),
                self.filename,
                &path,
                &self.version,
            ),
            method: registration.method,
            route_type: registration.route_type,
            filename: self.filename.to_string(),
            path,
            version: self.version.clone(),
            config,
        }))
    }

    fn string_argument(&self, call: &CallExpression<'_>, line: u32, method: &str, expected: &str) -> Result<String> {
        call.arguments
            .first()
            .and_then(argument_expression)
            .and_then(string_value)
            .ok_or_else(|| {
                ScanError::invalid_argument(
                    self.filename,
                    line,
                    method,
                    format!("first argument must be {}", expected),
                )
            })
    }

    fn sms(&self, call: &CallExpression<'_>, line: u32) -> Result<Registration> {
        let Some(Expression::ObjectExpression(options)) = call.arguments.first().and_then(argument_expression) else {
            return Err(ScanError::invalid_argument(
                self.filename,
                line,
                "sms",
                "first argument must be an object literal",
            ));
        };

        let mut extra = BTreeMap::new();
        for prop in &options.properties {
            let ObjectPropertyKind::ObjectProperty(p) = prop else {
                continue;
            };
            if p.computed {
                continue;
            }
            if let (Some(key), Some(value)) = (property_key_name(&p.key), literal_json(&p.value)) {
                extra.insert(key.to_string(), value);
            }
        }

        let number = match extra.get("number") {
            Some(serde_json::Value::String(n)) => n.clone(),
            _ => {
                return Err(ScanError::invalid_argument(
                    self.filename,
                    line,
                    "sms",
                    "options must include a string literal `number`",
                ))
            }
        };
        let mut registration = Registration::new(RouteMethod::Post, RouteType::Sms, stable_hash(&[number.as_str()]));
        registration.extra = extra;
        Ok(registration)
    }

    fn cron(&self, call: &CallExpression<'_>, line: u32) -> Result<Registration> {
        let expression = self.string_argument(call, line, "cron", "a string literal schedule")?;
        if let Err(err) = Cron::new(&expression).parse() {
            return Err(ScanError::InvalidRouterArgument {
                filename: self.filename.to_string(),
                line,
                method: "cron".to_string(),
                message: format!("invalid cron expression `{}`: {}", expression, err),
                source: Some(Box::new(err)),
            });
        }
        let mut registration = Registration::new(RouteMethod::Post, RouteType::Cron, stable_hash(&[expression.as_str()]));
        registration
            .extra
            .insert("expression".to_string(), serde_json::Value::String(expression));
        Ok(registration)
    }
}
