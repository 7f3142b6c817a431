//! # Namespace Resolution
//!
//! Maps a principal to the knowledge-store namespaces it may read. The
//! output order is fixed so the result can be compared and cached; the
//! function is referentially transparent because it also constructs
//! query-time restrictions.

use super::hierarchy::{AccessProfile, Role, Tier};

/// Namespaces reachable by a principal, in a stable order:
/// shared level-gated namespaces lowest to highest, then the
/// department-scoped namespace if the principal has a department.
///
/// Monotone in role and tier: raising either never removes an entry.
pub fn accessible_namespaces(profile: &AccessProfile) -> Vec<String> {
    let mut namespaces = Vec::new();

    // base namespace, always reachable
    namespaces.push("public".to_string());

    if profile.tier >= Tier::Basic {
        namespaces.push("basic".to_string());
    }
    if profile.role >= Role::Junior && profile.tier >= Tier::Basic {
        namespaces.push("intermediate".to_string());
    }
    if profile.role >= Role::Senior && profile.tier >= Tier::Pro {
        namespaces.push("advanced".to_string());
    }
    if profile.role >= Role::Manager && profile.tier >= Tier::Pro {
        namespaces.push("confidential".to_string());
    }
    if profile.role >= Role::Admin && profile.tier >= Tier::Enterprise {
        namespaces.push("executive".to_string());
    }

    if let Some(department) = &profile.department {
        namespaces.push(format!("dept_{}", department.to_lowercase()));
    }

    namespaces
}
