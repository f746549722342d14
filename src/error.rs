//! Error taxonomy for the scanner.
//!
//! Every failure raised while scanning a matched file belongs to one of the
//! kinds below. "Not the kind of file being scanned" is never an error: the
//! extractors return `Ok(None)` for that case.

use thiserror::Error;

use crate::conflicts::RouteConflict;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Boxed foreign error kept as the inspectable cause of a wrapped failure.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A panic caught while handling a single router call, kept as the cause of
/// the `InvalidRouterArgument` it is reported as.
#[derive(Error, Debug)]
#[error("panicked: {0}")]
pub struct DispatchPanic(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_DEFAULT_EXPORT: &str = "ERR_ROUTE_MISSING_EXPORT";
pub const ERR_INVALID_ROUTER_DECLARATION: &str = "ERR_ROUTE_INVALID_ROUTER";
pub const ERR_UNSUPPORTED_ROUTER_METHOD: &str = "ERR_ROUTE_UNSUPPORTED_METHOD";
pub const ERR_INVALID_ROUTER_ARGUMENT: &str = "ERR_ROUTE_INVALID_ARGUMENT";
pub const ERR_MISSING_AGENT_NAME: &str = "ERR_AGENT_MISSING_NAME";
pub const ERR_INVALID_AGENT_DECLARATION: &str = "ERR_AGENT_INVALID_DECLARATION";
pub const ERR_NON_LITERAL_EVAL_NAME: &str = "ERR_EVAL_NON_LITERAL_NAME";
pub const ERR_DUPLICATE_EVAL_NAME: &str = "ERR_EVAL_DUPLICATE_NAME";
pub const ERR_ROUTE_CONFLICT: &str = "ERR_ROUTE_CONFLICT";
pub const ERR_IO: &str = "ERR_IO";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{filename}: route file must `export default` its router")]
    MissingDefaultExport { filename: String },

    #[error("{filename}:{line}: invalid router declaration: {message}")]
    InvalidRouterDeclaration {
        filename: String,
        line: u32,
        message: String,
    },

    #[error("{filename}:{line}: unsupported router method `{method}`")]
    UnsupportedRouterMethod {
        filename: String,
        line: u32,
        method: String,
    },

    #[error("{filename}:{line}: invalid argument to `{method}`: {message}")]
    InvalidRouterArgument {
        filename: String,
        line: u32,
        method: String,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("{filename}:{line}: agent metadata must declare a `name`")]
    MissingAgentName { filename: String, line: u32 },

    #[error("{filename}:{line}: invalid agent declaration: {message}")]
    InvalidAgentDeclaration {
        filename: String,
        line: u32,
        message: String,
    },

    #[error("{filename}:{line}: eval name passed to createEval must be a string literal")]
    NonLiteralEvalName { filename: String, line: u32 },

    #[error("{filename}: duplicate eval names: {}", .names.join(", "))]
    DuplicateEvalName { filename: String, names: Vec<String> },

    #[error("{} route conflict(s) detected:\n{}", .conflicts.len(), format_conflicts(.conflicts))]
    RouteConflict { conflicts: Vec<RouteConflict> },

    #[error("{filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

fn format_conflicts(conflicts: &[RouteConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("  - {}", c.message))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ScanError {
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::MissingDefaultExport { .. } => ERR_MISSING_DEFAULT_EXPORT,
            ScanError::InvalidRouterDeclaration { .. } => ERR_INVALID_ROUTER_DECLARATION,
            ScanError::UnsupportedRouterMethod { .. } => ERR_UNSUPPORTED_ROUTER_METHOD,
            ScanError::InvalidRouterArgument { .. } => ERR_INVALID_ROUTER_ARGUMENT,
            ScanError::MissingAgentName { .. } => ERR_MISSING_AGENT_NAME,
            ScanError::InvalidAgentDeclaration { .. } => ERR_INVALID_AGENT_DECLARATION,
            ScanError::NonLiteralEvalName { .. } => ERR_NON_LITERAL_EVAL_NAME,
            ScanError::DuplicateEvalName { .. } => ERR_DUPLICATE_EVAL_NAME,
            ScanError::RouteConflict { .. } => ERR_ROUTE_CONFLICT,
            ScanError::Io { .. } => ERR_IO,
        }
    }

    /// File the failure belongs to. Aggregate conflicts span several files
    /// and report none.
    pub fn filename(&self) -> Option<&str> {
        match self {
            ScanError::MissingDefaultExport { filename }
            | ScanError::InvalidRouterDeclaration { filename, .. }
            | ScanError::UnsupportedRouterMethod { filename, .. }
            | ScanError::InvalidRouterArgument { filename, .. }
            | ScanError::MissingAgentName { filename, .. }
            | ScanError::InvalidAgentDeclaration { filename, .. }
            | ScanError::NonLiteralEvalName { filename, .. }
            | ScanError::DuplicateEvalName { filename, .. }
            | ScanError::Io { filename, .. } => Some(filename),
            ScanError::RouteConflict { .. } => None,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            ScanError::InvalidRouterDeclaration { line, .. }
            | ScanError::UnsupportedRouterMethod { line, .. }
            | ScanError::InvalidRouterArgument { line, .. }
            | ScanError::MissingAgentName { line, .. }
            | ScanError::InvalidAgentDeclaration { line, .. }
            | ScanError::NonLiteralEvalName { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn invalid_argument(
        filename: &str,
        line: u32,
        method: &str,
        message: impl Into<String>,
    ) -> Self {
        ScanError::InvalidRouterArgument {
            filename: filename.to_string(),
            line,
            method: method.to_string(),
            message: message.into(),
            source: None,
        }
    }
}
