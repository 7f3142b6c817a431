//! # Credential Store Adapter
//!
//! Durable records of real-world principals (employees, customers),
//! independent of any verification code. Credentials are created by
//! administrative import, mutated by administrative update or by the
//! verification flow (pending → verified), and never hard-deleted:
//! "deleted" is represented as `inactive`.
//!
//! All writes are idempotent keyed by the external identifier; re-importing
//! the same external id updates the existing record instead of duplicating.

pub mod secret;

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{GateError, GateResult};

/// Credential lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Pending,
    Verified,
    Suspended,
    Inactive,
}

impl CredentialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialStatus::Pending => "pending",
            CredentialStatus::Verified => "verified",
            CredentialStatus::Suspended => "suspended",
            CredentialStatus::Inactive => "inactive",
        }
    }
}

/// A real-world principal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,

    /// Stable external employee/customer identifier (idempotency key)
    pub external_id: String,

    pub full_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    pub status: CredentialStatus,

    /// Argon2id hash of the private identifier (never cleartext)
    #[serde(skip_serializing)]
    pub private_id_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

/// Credential creation input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCredential {
    pub external_id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    /// Cleartext private identifier; hashed before storage, never persisted
    #[serde(default)]
    pub private_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Administrative update; unset fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub team: Option<String>,
    pub position: Option<String>,
    pub status: Option<CredentialStatus>,
    pub metadata: Option<serde_json::Value>,
}

/// Per-row failure in a bulk import
#[derive(Debug, Clone, Serialize)]
pub struct BulkRowError {
    pub index: usize,
    pub message: String,
}

/// Result of a bulk import; a bad row never fails the whole batch
#[derive(Debug, Clone, Serialize)]
pub struct BulkImportOutcome {
    pub created: Vec<Credential>,
    pub errors: Vec<BulkRowError>,
}

impl Credential {
    /// Build a credential from import input, hashing the private identifier
    pub fn new(input: CreateCredential) -> GateResult<Self> {
        if input.external_id.trim().is_empty() {
            return Err(GateError::InvalidInput("external_id is required".to_string()));
        }
        if input.full_name.trim().is_empty() {
            return Err(GateError::InvalidInput("full_name is required".to_string()));
        }

        let private_id_hash = match &input.private_id {
            Some(raw) => Some(secret::hash_private_id(raw)?),
            None => None,
        };

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            external_id: input.external_id.trim().to_string(),
            full_name: input.full_name,
            email: input.email,
            phone: input.phone,
            department: input.department,
            team: input.team,
            position: input.position,
            status: CredentialStatus::Pending,
            private_id_hash,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
            verified_at: None,
        })
    }

    /// Verify the private identifier against the stored hash
    pub fn verify_private_id(&self, private_id: &str) -> GateResult<bool> {
        match &self.private_id_hash {
            Some(hash) => secret::verify_private_id(private_id, hash),
            None => Ok(false),
        }
    }
}

/// Credential repository contract.
///
/// `create` is an upsert keyed by external id. The adapter never issues
/// codes; it owns the credential records and nothing else.
pub trait CredentialRepository: Send + Sync {
    /// Insert, or update in place when the external id already exists
    fn create(&self, credential: &Credential) -> GateResult<Credential>;

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<Credential>>;

    fn find_by_email(&self, email: &str) -> GateResult<Option<Credential>>;

    fn find_by_external_id(&self, external_id: &str) -> GateResult<Option<Credential>>;

    fn update(&self, id: Uuid, patch: &CredentialPatch) -> GateResult<Credential>;

    /// Mark the credential verified (pending → verified) and stamp the time
    fn verify(&self, id: Uuid) -> GateResult<Credential>;

    /// Soft delete: status becomes `inactive`, the record survives
    fn soft_delete(&self, id: Uuid) -> GateResult<()>;

    /// Bulk import. Each bad row yields one error entry at its index;
    /// the remaining rows are created normally.
    fn create_bulk(&self, rows: Vec<CreateCredential>) -> GateResult<BulkImportOutcome> {
        let mut outcome = BulkImportOutcome {
            created: Vec::new(),
            errors: Vec::new(),
        };

        for (index, row) in rows.into_iter().enumerate() {
            match Credential::new(row).and_then(|c| self.create(&c)) {
                Ok(created) => outcome.created.push(created),
                Err(e) => outcome.errors.push(BulkRowError {
                    index,
                    message: e.to_string(),
                }),
            }
        }

        Ok(outcome)
    }
}

/// In-memory credential repository for tests and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    records: RwLock<Vec<Credential>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> GateError {
        GateError::StorageError("credential lock poisoned".to_string())
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn create(&self, credential: &Credential) -> GateResult<Credential> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;

        if let Some(existing) = records
            .iter_mut()
            .find(|c| c.external_id == credential.external_id)
        {
            // idempotent re-import: update fields, keep identity and history
            existing.full_name = credential.full_name.clone();
            existing.email = credential.email.clone();
            existing.phone = credential.phone.clone();
            existing.department = credential.department.clone();
            existing.team = credential.team.clone();
            existing.position = credential.position.clone();
            if credential.private_id_hash.is_some() {
                existing.private_id_hash = credential.private_id_hash.clone();
            }
            if credential.metadata.is_some() {
                existing.metadata = credential.metadata.clone();
            }
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        records.push(credential.clone());
        Ok(credential.clone())
    }

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<Credential>> {
        let records = self.records.read().map_err(|_| Self::lock_err())?;
        Ok(records.iter().find(|c| c.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> GateResult<Option<Credential>> {
        let records = self.records.read().map_err(|_| Self::lock_err())?;
        Ok(records
            .iter()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned())
    }

    fn find_by_external_id(&self, external_id: &str) -> GateResult<Option<Credential>> {
        let records = self.records.read().map_err(|_| Self::lock_err())?;
        Ok(records.iter().find(|c| c.external_id == external_id).cloned())
    }

    fn update(&self, id: Uuid, patch: &CredentialPatch) -> GateResult<Credential> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CredentialNotFound)?;

        if let Some(v) = &patch.full_name {
            record.full_name = v.clone();
        }
        if let Some(v) = &patch.email {
            record.email = Some(v.clone());
        }
        if let Some(v) = &patch.phone {
            record.phone = Some(v.clone());
        }
        if let Some(v) = &patch.department {
            record.department = Some(v.clone());
        }
        if let Some(v) = &patch.team {
            record.team = Some(v.clone());
        }
        if let Some(v) = &patch.position {
            record.position = Some(v.clone());
        }
        if let Some(v) = patch.status {
            record.status = v;
        }
        if let Some(v) = &patch.metadata {
            record.metadata = Some(v.clone());
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    fn verify(&self, id: Uuid) -> GateResult<Credential> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CredentialNotFound)?;

        record.status = CredentialStatus::Verified;
        record.verified_at = Some(Utc::now());
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    fn soft_delete(&self, id: Uuid) -> GateResult<()> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CredentialNotFound)?;

        record.status = CredentialStatus::Inactive;
        record.updated_at = Utc::now();
        Ok(())
    }
}
