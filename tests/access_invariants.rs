//! Access Decision Invariant Tests
//!
//! The permission model must be monotone in both orderings: raising a
//! principal's role or tier never removes access it already had, whether
//! the access is a classification level or a namespace.

use codegate::access::{
    accessible_namespaces, check_classification, check_level, max_access_level, AccessLevel,
    AccessProfile, Classification, Role, Tier,
};

// =============================================================================
// LEVEL CHECKS
// =============================================================================

/// A free-tier user cannot read confidential content; the same person as a
/// pro-tier manager can.
#[test]
fn test_upgrade_unlocks_confidential() {
    let before = check_level(Role::User, Tier::Free, AccessLevel::Confidential);
    assert!(!before.allowed);
    assert!(before.reason.is_some());

    let after = check_level(Role::Manager, Tier::Pro, AccessLevel::Confidential);
    assert!(after.allowed);
}

/// Denials carry actionable upgrade guidance: the lowest role or tier that
/// would satisfy the request.
#[test]
fn test_denial_names_upgrade_target() {
    let check = check_level(Role::User, Tier::Enterprise, AccessLevel::Advanced);
    assert!(!check.allowed);
    assert_eq!(check.required_role, Some(Role::Senior));

    let check = check_level(Role::Ceo, Tier::Free, AccessLevel::Basic);
    assert!(!check.allowed);
    assert_eq!(check.required_tier, Some(Tier::Basic));
}

/// Access decisions are monotone over the full role × tier × level space.
#[test]
fn test_decisions_monotone_everywhere() {
    for level in AccessLevel::ALL {
        for role in Role::ALL {
            for tier in Tier::ALL {
                if !check_level(role, tier, level).allowed {
                    continue;
                }
                for higher_role in Role::ALL.into_iter().filter(|r| *r >= role) {
                    for higher_tier in Tier::ALL.into_iter().filter(|t| *t >= tier) {
                        assert!(
                            check_level(higher_role, higher_tier, level).allowed,
                            "monotonicity broken at {higher_role:?}/{higher_tier:?}/{level:?}"
                        );
                    }
                }
            }
        }
    }
}

/// The maximum access level never decreases along either ordering.
#[test]
fn test_max_level_monotone() {
    for role in Role::ALL {
        for tier in Tier::ALL {
            let here = max_access_level(role, tier);
            for higher_role in Role::ALL.into_iter().filter(|r| *r >= role) {
                for higher_tier in Tier::ALL.into_iter().filter(|t| *t >= tier) {
                    assert!(max_access_level(higher_role, higher_tier) >= here);
                }
            }
        }
    }
}

// =============================================================================
// NAMESPACES
// =============================================================================

/// Raising role or tier never removes a namespace from the computed set.
#[test]
fn test_namespaces_monotone() {
    for role in Role::ALL {
        for tier in Tier::ALL {
            let base = accessible_namespaces(&AccessProfile::new(role, tier));
            for higher_role in Role::ALL.into_iter().filter(|r| *r >= role) {
                for higher_tier in Tier::ALL.into_iter().filter(|t| *t >= tier) {
                    let wider =
                        accessible_namespaces(&AccessProfile::new(higher_role, higher_tier));
                    for ns in &base {
                        assert!(wider.contains(ns), "lost {ns} at {higher_role:?}/{higher_tier:?}");
                    }
                }
            }
        }
    }
}

/// Identical inputs always produce an identical, order-stable output.
#[test]
fn test_namespaces_referentially_transparent() {
    let profile = AccessProfile::new(Role::Manager, Tier::Pro).with_department("Sales");
    let runs: Vec<Vec<String>> = (0..5).map(|_| accessible_namespaces(&profile)).collect();
    for pair in runs.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

// =============================================================================
// CLASSIFICATION OVERRIDES
// =============================================================================

/// Department allow-lists bind everyone below the two full-access roles.
#[test]
fn test_department_override_spares_full_access_roles() {
    let class = Classification {
        level: AccessLevel::Basic,
        departments: vec!["hr".to_string()],
        ..Default::default()
    };

    let manager = AccessProfile::new(Role::Manager, Tier::Pro).with_department("sales");
    assert!(!check_classification(&manager, &class).allowed);

    let admin = AccessProfile::new(Role::Admin, Tier::Pro).with_department("sales");
    assert!(check_classification(&admin, &class).allowed);

    let ceo = AccessProfile::new(Role::Ceo, Tier::Pro);
    assert!(check_classification(&ceo, &class).allowed);
}

/// Specific role/tier requirements are hard overrides layered on the level
/// check, and both must pass.
#[test]
fn test_specific_overrides_are_conjunctive() {
    let class = Classification {
        level: AccessLevel::Basic,
        required_role: Some(Role::Manager),
        required_tier: Some(Tier::Enterprise),
        departments: Vec::new(),
    };

    let strong_role = AccessProfile::new(Role::Ceo, Tier::Pro);
    assert!(!check_classification(&strong_role, &class).allowed);

    let strong_tier = AccessProfile::new(Role::Junior, Tier::Enterprise);
    assert!(!check_classification(&strong_tier, &class).allowed);

    let both = AccessProfile::new(Role::Manager, Tier::Enterprise);
    assert!(check_classification(&both, &class).allowed);
}
