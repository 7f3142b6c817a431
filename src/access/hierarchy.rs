//! # Role, Tier, and Access Level Hierarchies
//!
//! Closed enumerations with explicit total orderings. Declaration order is
//! the ordering, so monotonicity of access decisions is checkable by the
//! compiler (`derive(PartialOrd, Ord)`) instead of by string comparison.

use serde::{Deserialize, Serialize};

/// Organizational role, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Junior,
    Senior,
    Manager,
    Admin,
    Ceo,
}

impl Role {
    /// All roles, lowest first
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Junior,
        Role::Senior,
        Role::Manager,
        Role::Admin,
        Role::Ceo,
    ];

    /// Integer rank (position in the ordering)
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Junior => "junior",
            Role::Senior => "senior",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Ceo => "ceo",
        }
    }
}

/// Subscription tier, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl Tier {
    /// All tiers, lowest first
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Pro, Tier::Enterprise];

    /// Integer rank (position in the ordering)
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }
}

/// Resource classification level, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    Basic,
    Intermediate,
    Advanced,
    Confidential,
    Executive,
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::Public
    }
}

impl AccessLevel {
    /// All levels, lowest first
    pub const ALL: [AccessLevel; 6] = [
        AccessLevel::Public,
        AccessLevel::Basic,
        AccessLevel::Intermediate,
        AccessLevel::Advanced,
        AccessLevel::Confidential,
        AccessLevel::Executive,
    ];

    /// Minimum role and tier required to read content at this level
    pub fn requirements(self) -> (Role, Tier) {
        match self {
            AccessLevel::Public => (Role::User, Tier::Free),
            AccessLevel::Basic => (Role::User, Tier::Basic),
            AccessLevel::Intermediate => (Role::Junior, Tier::Basic),
            AccessLevel::Advanced => (Role::Senior, Tier::Pro),
            AccessLevel::Confidential => (Role::Manager, Tier::Pro),
            AccessLevel::Executive => (Role::Admin, Tier::Enterprise),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Basic => "basic",
            AccessLevel::Intermediate => "intermediate",
            AccessLevel::Advanced => "advanced",
            AccessLevel::Confidential => "confidential",
            AccessLevel::Executive => "executive",
        }
    }
}

/// The slice of a principal the decision engine needs: role, tier, and
/// department. Kept separate from the stored profile so decisions stay pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProfile {
    pub role: Role,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl AccessProfile {
    pub fn new(role: Role, tier: Tier) -> Self {
        Self {
            role,
            tier,
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}
