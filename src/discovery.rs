//! Discovery module for the scanner
//!
//! Walks the API and agent roots, runs the extractors over every source file
//! in parallel, and applies the failure policy of the scan mode.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::agents::{extract_agent, AgentTransform, EVAL_FILENAMES};
use crate::conflicts::{detect_conflicts, RouteConflict};
use crate::error::{Result, ScanError};
use crate::options::{ScanMode, ScanOptions};
use crate::routes::{extract_routes, RouteRecord};

const SOURCE_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A failure reported, not raised, by a development-mode scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl From<&ScanError> for ReportedError {
    fn from(err: &ScanError) -> Self {
        ReportedError {
            code: err.code(),
            message: err.to_string(),
            filename: err.filename().map(str::to_string),
            line: err.line(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectScan {
    pub routes: Vec<RouteRecord>,
    pub agents: Vec<AgentTransform>,
    pub conflicts: Vec<RouteConflict>,
    pub errors: Vec<ReportedError>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

fn is_source_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.ends_with(".d.ts") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn is_eval_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| EVAL_FILENAMES.contains(&name))
}

/// Source files under `dir`, sorted. A missing directory has none.
pub fn find_source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_source_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT SCAN
// ═══════════════════════════════════════════════════════════════════════════════

fn read_source(path: &Path, filename: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ScanError::Io {
        filename: filename.to_string(),
        source,
    })
}

/// Applies the scan mode to one file's outcome.
fn settle<T>(
    outcome: Result<T>,
    mode: ScanMode,
    errors: &mut Vec<ReportedError>,
) -> Result<Option<T>> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(err) if mode == ScanMode::Development => {
            tracing::error!(code = err.code(), "{}", err);
            errors.push(ReportedError::from(&err));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Scans every route and agent file of a project. Records are ordered by
/// filename, then by position within the file.
pub fn scan_project(options: &ScanOptions) -> Result<ProjectScan> {
    let api_files = find_source_files(&options.resolve(&options.api_dir));
    let agent_files: Vec<PathBuf> = find_source_files(&options.resolve(&options.agent_dir))
        .into_iter()
        .filter(|path| !is_eval_file(path))
        .collect();

    let route_results: Vec<Result<Vec<RouteRecord>>> = api_files
        .par_iter()
        .map(|path| {
            let filename = options.relative_filename(path);
            let source = read_source(path, &filename)?;
            extract_routes(&source, &filename, options)
        })
        .collect();

    let agent_results: Vec<Result<Option<AgentTransform>>> = agent_files
        .par_iter()
        .map(|path| {
            let filename = options.relative_filename(path);
            let source = read_source(path, &filename)?;
            extract_agent(&source, &filename, options)
        })
        .collect();

    let mut scan = ProjectScan::default();
    for outcome in route_results {
        if let Some(routes) = settle(outcome, options.mode, &mut scan.errors)? {
            scan.routes.extend(routes);
        }
    }
    for outcome in agent_results {
        if let Some(Some(agent)) = settle(outcome, options.mode, &mut scan.errors)? {
            scan.agents.push(agent);
        }
    }

    scan.conflicts = detect_conflicts(&scan.routes);
    if !scan.conflicts.is_empty() {
        let err = ScanError::RouteConflict {
            conflicts: scan.conflicts.clone(),
        };
        settle::<()>(Err(err), options.mode, &mut scan.errors)?;
    }

    tracing::info!(
        routes = scan.routes.len(),
        agents = scan.agents.len(),
        conflicts = scan.conflicts.len(),
        errors = scan.errors.len(),
        "project scan complete"
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("src/api/index.ts")));
        assert!(is_source_file(Path::new("src/api/page.jsx")));
        assert!(!is_source_file(Path::new("src/api/types.d.ts")));
        assert!(!is_source_file(Path::new("src/api/readme.md")));
    }

    #[test]
    fn test_missing_directory_has_no_files() {
        assert!(find_source_files(Path::new("/nonexistent/scan/dir")).is_empty());
    }

    #[test]
    fn test_eval_files_are_recognised() {
        assert!(is_eval_file(Path::new("src/agent/chat/eval.ts")));
        assert!(is_eval_file(Path::new("src/agent/chat/evals.js")));
        assert!(!is_eval_file(Path::new("src/agent/chat/agent.ts")));
    }
}
