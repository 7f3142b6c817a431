//! # Verification Code Model
//!
//! A code is a capability: possessing the token and satisfying its
//! constraints is necessary and sufficient for one redemption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::access::{Role, Tier};

/// Code lifecycle status. `Used`, `Expired`, and `Disabled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Active,
    Used,
    Expired,
    Disabled,
}

impl CodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeStatus::Active => "active",
            CodeStatus::Used => "used",
            CodeStatus::Expired => "expired",
            CodeStatus::Disabled => "disabled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CodeStatus::Active)
    }
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential field a redemption request may be required to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Email,
    EmployeeId,
    Name,
    Phone,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Email => "email",
            MatchField::EmployeeId => "employee_id",
            MatchField::Name => "name",
            MatchField::Phone => "phone",
        }
    }
}

/// A verification code record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub id: Uuid,

    /// The human-transcribable token, normalized form
    pub code: String,

    pub status: CodeStatus,

    pub max_uses: u32,

    /// Invariant: `current_uses <= max_uses`, enforced by the conditional
    /// redemption write
    pub current_uses: u32,

    /// `None` means the code never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Credential this code is bound to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<Uuid>,

    /// Whether redemption must match fields of the bound credential
    #[serde(default)]
    pub requires_credential_match: bool,

    /// Fields that must match when `requires_credential_match` is set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_fields: Vec<MatchField>,

    /// Role granted to the principal created on redemption
    pub role: Role,

    /// Tier granted to the principal created on redemption
    pub tier: Tier,

    /// Private namespace attached to the resulting principal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// External identities that redeemed this code, in order
    #[serde(default)]
    pub used_by: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Whether the deadline has passed. Expiry is checked at redemption
    /// time; there is no background sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|deadline| deadline < now).unwrap_or(false)
    }

    /// Uses left before the code exhausts
    pub fn remaining_uses(&self) -> u32 {
        self.max_uses.saturating_sub(self.current_uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(expires_at: Option<DateTime<Utc>>) -> VerificationCode {
        VerificationCode {
            id: Uuid::new_v4(),
            code: "ABC-DEF-GHJ-KLM".to_string(),
            status: CodeStatus::Active,
            max_uses: 1,
            current_uses: 0,
            expires_at,
            credential_id: None,
            requires_credential_match: false,
            match_fields: Vec::new(),
            role: Role::User,
            tier: Tier::Free,
            namespace: None,
            used_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_expires_when_deadline_unset() {
        let c = code(None);
        assert!(!c.is_expired(Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn test_expired_past_deadline() {
        let c = code(Some(Utc::now() - Duration::hours(1)));
        assert!(c.is_expired(Utc::now()));
    }

    #[test]
    fn test_remaining_uses_saturates() {
        let mut c = code(None);
        c.max_uses = 2;
        c.current_uses = 2;
        assert_eq!(c.remaining_uses(), 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CodeStatus::Active.is_terminal());
        assert!(CodeStatus::Used.is_terminal());
        assert!(CodeStatus::Expired.is_terminal());
        assert!(CodeStatus::Disabled.is_terminal());
    }
}
