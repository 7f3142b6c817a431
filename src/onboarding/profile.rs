//! # Principal Profiles
//!
//! The authorized identity bound to an external messaging identity.
//! A profile is created exactly once per external identity, on first
//! successful code redemption, and never recreated while it exists.
//! The private namespace set at creation is immutable by ordinary
//! interaction; `rebind_namespace` exists for administrator repair only.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{AccessProfile, Role, Tier};
use crate::core::error::{GateError, GateResult};

/// An authorized principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalProfile {
    pub id: Uuid,

    /// External messaging identity (unique)
    pub external_id: String,

    /// Display name hint captured at onboarding
    pub display_name: String,

    pub role: Role,
    pub tier: Tier,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Private knowledge-store partition, set from the redeemed code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_namespace: Option<String>,

    /// Credential the profile was verified against, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<Uuid>,

    /// Token of the code that created this profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_with_code: Option<String>,

    pub first_contact_at: DateTime<Utc>,
    pub last_contact_at: DateTime<Utc>,
}

impl PrincipalProfile {
    /// The slice the access decision engine consumes
    pub fn access_profile(&self) -> AccessProfile {
        AccessProfile {
            role: self.role,
            tier: self.tier,
            department: self.department.clone(),
        }
    }
}

/// Principal profile repository contract
pub trait ProfileRepository: Send + Sync {
    /// Create a profile; fails if one exists for the external identity
    fn create(&self, profile: &PrincipalProfile) -> GateResult<()>;

    fn find_by_external_id(&self, external_id: &str) -> GateResult<Option<PrincipalProfile>>;

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<PrincipalProfile>>;

    /// Stamp the last-contact timestamp
    fn touch(&self, id: Uuid, when: DateTime<Utc>) -> GateResult<()>;

    /// Administrative role/tier change
    fn set_role_tier(&self, id: Uuid, role: Role, tier: Tier) -> GateResult<PrincipalProfile>;

    /// Administrator-only repair of the bound namespace. Not reachable
    /// from the chat surface.
    fn rebind_namespace(&self, id: Uuid, namespace: Option<String>) -> GateResult<()>;
}

/// In-memory profile repository
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<Vec<PrincipalProfile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> GateError {
        GateError::StorageError("profile lock poisoned".to_string())
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn create(&self, profile: &PrincipalProfile) -> GateResult<()> {
        let mut profiles = self.profiles.write().map_err(|_| Self::lock_err())?;
        if profiles.iter().any(|p| p.external_id == profile.external_id) {
            return Err(GateError::ProfileExists);
        }
        profiles.push(profile.clone());
        Ok(())
    }

    fn find_by_external_id(&self, external_id: &str) -> GateResult<Option<PrincipalProfile>> {
        let profiles = self.profiles.read().map_err(|_| Self::lock_err())?;
        Ok(profiles
            .iter()
            .find(|p| p.external_id == external_id)
            .cloned())
    }

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<PrincipalProfile>> {
        let profiles = self.profiles.read().map_err(|_| Self::lock_err())?;
        Ok(profiles.iter().find(|p| p.id == id).cloned())
    }

    fn touch(&self, id: Uuid, when: DateTime<Utc>) -> GateResult<()> {
        let mut profiles = self.profiles.write().map_err(|_| Self::lock_err())?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GateError::ProfileNotFound)?;
        profile.last_contact_at = when;
        Ok(())
    }

    fn set_role_tier(&self, id: Uuid, role: Role, tier: Tier) -> GateResult<PrincipalProfile> {
        let mut profiles = self.profiles.write().map_err(|_| Self::lock_err())?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GateError::ProfileNotFound)?;
        profile.role = role;
        profile.tier = tier;
        Ok(profile.clone())
    }

    fn rebind_namespace(&self, id: Uuid, namespace: Option<String>) -> GateResult<()> {
        let mut profiles = self.profiles.write().map_err(|_| Self::lock_err())?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GateError::ProfileNotFound)?;
        profile.private_namespace = namespace;
        Ok(())
    }
}
