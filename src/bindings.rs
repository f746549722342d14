//! JavaScript host bindings. Options arrive as JSON, records leave as JSON
//! values, and every `ScanError` is reported as `[CODE] message`.

use napi_derive::napi;

use crate::agents::extract_agent;
use crate::conflicts::detect_conflicts;
use crate::discovery::scan_project;
use crate::error::ScanError;
use crate::evals::{extract_evals, AgentIdTable};
use crate::options::ScanOptions;
use crate::routes::{extract_routes, RouteRecord};

fn to_napi(err: ScanError) -> napi::Error {
    napi::Error::from_reason(format!("[{}] {}", err.code(), err))
}

fn options_from(json: &str) -> napi::Result<ScanOptions> {
    ScanOptions::from_json(json).map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> napi::Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| napi::Error::from_reason(format!("Serialize error: {}", e)))
}

#[napi]
pub fn extract_routes_native(source: String, filename: String, options_json: String) -> napi::Result<serde_json::Value> {
    let options = options_from(&options_json)?;
    let routes = extract_routes(&source, &filename, &options).map_err(to_napi)?;
    to_value(&routes)
}

/// `null` for files that are not agent files.
#[napi]
pub fn extract_agent_native(source: String, filename: String, options_json: String) -> napi::Result<serde_json::Value> {
    let options = options_from(&options_json)?;
    let agent = extract_agent(&source, &filename, &options).map_err(to_napi)?;
    to_value(&agent)
}

/// `agents_json` maps root-relative agent filenames to their `agentId`.
#[napi]
pub fn extract_evals_native(
    source: String,
    filename: String,
    options_json: String,
    agents_json: String,
) -> napi::Result<serde_json::Value> {
    let options = options_from(&options_json)?;
    let agents: AgentIdTable = serde_json::from_str(&agents_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid agent table: {}", e)))?;
    let evals = extract_evals(&source, &filename, &options, &agents).map_err(to_napi)?;
    to_value(&evals)
}

/// Conflicts over a route list previously returned by the extractors.
#[napi]
pub fn detect_conflicts_native(routes: serde_json::Value) -> napi::Result<serde_json::Value> {
    let routes: Vec<RouteRecord> = serde_json::from_value(routes)
        .map_err(|e| napi::Error::from_reason(format!("Invalid routes: {}", e)))?;
    to_value(&detect_conflicts(&routes))
}

#[napi]
pub fn scan_project_native(options_json: String) -> napi::Result<serde_json::Value> {
    let options = options_from(&options_json)?;
    let scan = scan_project(&options).map_err(to_napi)?;
    to_value(&scan)
}
