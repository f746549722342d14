//! Route conflict detection over the union of every discovered route.
//!
//! Two rules: an exact `(method, path)` duplicate, and routes that only
//! differ in the names of their path parameters (`/users/:id` vs
//! `/users/:userId`), which a router cannot tell apart at request time.
//! Whether a non-empty result is fatal is up to the caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::routes::RouteRecord;

const PARAM_PLACEHOLDER: &str = ":*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Duplicate,
    AmbiguousParam,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteConflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub routes: Vec<RouteRecord>,
    pub message: String,
}

/// Path with every `:param` segment replaced by one placeholder.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with(':') {
                PARAM_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn describe(routes: &[RouteRecord]) -> String {
    routes
        .iter()
        .map(|r| format!("{} {} ({})", r.method.as_str().to_uppercase(), r.path, r.filename))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn detect_conflicts(routes: &[RouteRecord]) -> Vec<RouteConflict> {
    let mut exact: BTreeMap<(&str, &str), Vec<&RouteRecord>> = BTreeMap::new();
    let mut shaped: BTreeMap<(&str, String), Vec<&RouteRecord>> = BTreeMap::new();
    for route in routes {
        exact
            .entry((route.method.as_str(), route.path.as_str()))
            .or_default()
            .push(route);
        if route.path.contains("/:") {
            shaped
                .entry((route.method.as_str(), path_shape(&route.path)))
                .or_default()
                .push(route);
        }
    }

    let mut conflicts = Vec::new();

    for ((method, path), group) in &exact {
        if group.len() < 2 {
            continue;
        }
        let routes: Vec<RouteRecord> = group.iter().map(|r| (*r).clone()).collect();
        conflicts.push(RouteConflict {
            kind: ConflictKind::Duplicate,
            message: format!(
                "duplicate route {} {}: {}",
                method.to_uppercase(),
                path,
                describe(&routes)
            ),
            routes,
        });
    }

    for ((method, shape), group) in &shaped {
        let distinct_paths: BTreeSet<&str> = group.iter().map(|r| r.path.as_str()).collect();
        if distinct_paths.len() < 2 {
            continue;
        }
        // One representative per distinct spelling; exact duplicates are
        // already reported above.
        let mut seen = BTreeSet::new();
        let routes: Vec<RouteRecord> = group
            .iter()
            .filter(|r| seen.insert(r.path.clone()))
            .map(|r| (*r).clone())
            .collect();
        conflicts.push(RouteConflict {
            kind: ConflictKind::AmbiguousParam,
            message: format!(
                "ambiguous parameter names for {} {}: {}",
                method.to_uppercase(),
                shape,
                describe(&routes)
            ),
            routes,
        });
    }

    conflicts
}
