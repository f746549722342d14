//! # Scanner Native
//!
//! Static analysis and code generation for route, agent and eval source
//! files. Files are parsed with an error-recovering parser, metadata is read
//! from the literal call shapes the authoring API uses, deterministic ids are
//! assigned, and agent/eval files are regenerated with that metadata
//! injected.
//!
//! ## Identity Invariants
//!
//! 1. **Determinism**: every id is a hash of an explicit, ordered tuple of
//!    inputs. Same inputs, same id, on every run and platform.
//!
//! 2. **Stability**: `agentId` and an eval's `identifier` never include the
//!    content version, so unrelated edits keep them. Record `id` and
//!    `version` change whenever file text changes.
//!
//! 3. **No incremental state**: records are recomputed from scratch on every
//!    scan. Diffing against earlier scans is the host's job.
//!
//! ## Failure Model
//!
//! A file that is not of the kind being scanned yields nothing. A matched
//! file that violates the authoring rules yields a `ScanError` carrying its
//! filename and, where one exists, a line.

#[cfg(feature = "napi")]
mod bindings;

pub mod agents;
pub mod codegen;
pub mod conflicts;
pub mod discovery;
pub mod error;
pub mod evals;
pub mod hash;
pub mod module_scope;
pub mod options;
pub mod parse;
pub mod routes;
pub mod static_eval;
pub mod validator;

#[cfg(test)]
mod agents_tests;
#[cfg(test)]
mod pipeline_tests;

pub use agents::{extract_agent, AgentRecord, AgentTransform, SiblingEvals};
pub use conflicts::{detect_conflicts, ConflictKind, RouteConflict};
pub use discovery::{scan_project, ProjectScan, ReportedError};
pub use error::{Result, ScanError};
pub use evals::{extract_evals, AgentIdTable, EvalRecord, EvalTransform};
pub use options::{ScanMode, ScanOptions};
pub use routes::{extract_routes, RouteConfig, RouteMethod, RouteRecord, RouteType};
pub use validator::{match_validator, ValidatorMatch};

#[cfg(feature = "napi")]
pub use bindings::{
    detect_conflicts_native, extract_agent_native, extract_evals_native, extract_routes_native,
    scan_project_native,
};
