//! # Access Decision Engine
//!
//! Pure, deterministic permission checks over the role × tier hierarchy.
//! No I/O lives here; the same functions filter results and construct
//! query-time namespace restrictions, so they must be referentially
//! transparent.

pub mod decision;
pub mod hierarchy;
pub mod namespaces;

pub use decision::{check_classification, check_level, max_access_level, AccessCheck, Classification};
pub use hierarchy::{AccessLevel, AccessProfile, Role, Tier};
pub use namespaces::accessible_namespaces;

/// The two highest roles bypass department restrictions entirely.
pub fn has_full_access(role: Role) -> bool {
    role >= Role::Admin
}
