//! Identity hashing.
//!
//! Both functions hash the in-order concatenation of their parts, so
//! `("ab", "c")` and `("a", "bc")` collide while `("a", "b")` and `("b", "a")`
//! do not. Callers always pass fixed-arity tuples.

use sha2::{Digest, Sha256};

/// Length of a `stable_hash` digest.
pub const STABLE_HASH_LEN: usize = 16;

/// Upper bound for typed stable identifiers (`agent_…`, `eval_…`).
pub const MAX_STABLE_ID_LEN: usize = 64;

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Long digest used for change detection (`version`).
pub fn content_hash(parts: &[&str]) -> String {
    digest(parts)
}

/// Short digest composed into typed identifiers.
pub fn stable_hash(parts: &[&str]) -> String {
    let mut hex = digest(parts);
    hex.truncate(STABLE_HASH_LEN);
    hex
}

fn typed_id(prefix: &str, parts: &[&str]) -> String {
    format!("{}_{}", prefix, stable_hash(parts))
}

fn typed_stable_id(prefix: &str, parts: &[&str]) -> String {
    let mut id = typed_id(prefix, parts);
    id.truncate(MAX_STABLE_ID_LEN);
    id
}

pub fn route_id(
    project_id: &str,
    deployment_id: &str,
    route_type: &str,
    method: &str,
    filename: &str,
    path: &str,
    version: &str,
) -> String {
    typed_id(
        "route",
        &[
            project_id,
            deployment_id,
            route_type,
            method,
            filename,
            path,
            version,
        ],
    )
}

pub fn agent_record_id(
    project_id: &str,
    deployment_id: &str,
    filename: &str,
    version: &str,
) -> String {
    typed_id("agentid", &[project_id, deployment_id, filename, version])
}

/// Survives content edits: only the project and agent name feed it.
pub fn stable_agent_id(project_id: &str, name: &str) -> String {
    typed_stable_id("agent", &[project_id, name])
}

pub fn eval_record_id(
    project_id: &str,
    deployment_id: &str,
    filename: &str,
    name: &str,
    version: &str,
) -> String {
    typed_id("evalid", &[project_id, deployment_id, filename, name, version])
}

pub fn stable_eval_id(project_id: &str, agent_id: &str, name: &str) -> String {
    typed_stable_id("eval", &[project_id, agent_id, name])
}
