//! # Access Decisions
//!
//! Pass/fail checks of a principal against a requested classification.
//! A denial always names the lowest role or tier that *would* satisfy the
//! request, so the caller can surface actionable upgrade guidance instead
//! of a bare refusal.

use serde::{Deserialize, Serialize};

use super::hierarchy::{AccessLevel, AccessProfile, Role, Tier};

/// Classification attached to a protected resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    /// Minimum access level
    #[serde(default = "default_level")]
    pub level: AccessLevel,

    /// Hard role override, evaluated after the level check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_role: Option<Role>,

    /// Hard tier override, evaluated after the level check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tier: Option<Tier>,

    /// Department allow-list; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub departments: Vec<String>,
}

fn default_level() -> AccessLevel {
    AccessLevel::Public
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_tier: Option<Tier>,
}

impl AccessCheck {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            required_role: None,
            required_tier: None,
        }
    }

    fn denied_role(required: Role) -> Self {
        Self {
            allowed: false,
            reason: Some(format!("Requires role: {} or higher", required.as_str())),
            required_role: Some(required),
            required_tier: None,
        }
    }

    fn denied_tier(required: Tier) -> Self {
        Self {
            allowed: false,
            reason: Some(format!(
                "Requires subscription: {} or higher",
                required.as_str()
            )),
            required_role: None,
            required_tier: Some(required),
        }
    }
}

/// Lowest role satisfying a minimum, found by scanning the ordered list
/// upward. The first satisfying label is the actionable upgrade target.
fn lowest_satisfying_role(min: Role) -> Role {
    Role::ALL
        .into_iter()
        .find(|r| *r >= min)
        .unwrap_or(Role::Ceo)
}

fn lowest_satisfying_tier(min: Tier) -> Tier {
    Tier::ALL
        .into_iter()
        .find(|t| *t >= min)
        .unwrap_or(Tier::Enterprise)
}

/// Check a principal's role and tier against an access level.
///
/// Monotonic in both orderings: raising role or tier can only turn a denial
/// into an approval, never the reverse.
pub fn check_level(role: Role, tier: Tier, level: AccessLevel) -> AccessCheck {
    let (min_role, min_tier) = level.requirements();

    if role < min_role {
        return AccessCheck::denied_role(lowest_satisfying_role(min_role));
    }
    if tier < min_tier {
        return AccessCheck::denied_tier(lowest_satisfying_tier(min_tier));
    }

    AccessCheck::allowed()
}

/// Check a principal against a full classification: level first, then the
/// hard role/tier overrides, then the department allow-list. Department
/// restrictions do not apply to the two highest roles.
pub fn check_classification(profile: &AccessProfile, class: &Classification) -> AccessCheck {
    let level_check = check_level(profile.role, profile.tier, class.level);
    if !level_check.allowed {
        return level_check;
    }

    if let Some(required) = class.required_role {
        if profile.role < required {
            return AccessCheck::denied_role(required);
        }
    }

    if let Some(required) = class.required_tier {
        if profile.tier < required {
            return AccessCheck::denied_tier(required);
        }
    }

    if !class.departments.is_empty() && !super::has_full_access(profile.role) {
        let member = profile
            .department
            .as_deref()
            .map(|d| class.departments.iter().any(|allowed| allowed == d))
            .unwrap_or(false);
        if !member {
            return AccessCheck {
                allowed: false,
                reason: Some(format!(
                    "Restricted to departments: {}",
                    class.departments.join(", ")
                )),
                required_role: None,
                required_tier: None,
            };
        }
    }

    AccessCheck::allowed()
}

/// Highest access level the principal satisfies. Scans from the top.
pub fn max_access_level(role: Role, tier: Tier) -> AccessLevel {
    AccessLevel::ALL
        .into_iter()
        .rev()
        .find(|level| check_level(role, tier, *level).allowed)
        .unwrap_or(AccessLevel::Public)
}
