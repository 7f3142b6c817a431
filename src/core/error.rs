//! # Gate Errors
//!
//! Error taxonomy for the access control engine.
//!
//! Failure policy is explicit per component:
//! - code lifecycle and access decisions fail closed
//! - the rate limiter fails open (see `ratelimit`)
//! - audit/logging failures are swallowed and logged internally
//!
//! Business-logic failures on the chat surface are delivered inside a
//! success payload; `user_message` carries the distinct per-state text.

use thiserror::Error;

use crate::verification::CodeStatus;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Errors produced by the access control engine
#[derive(Debug, Clone, Error)]
pub enum GateError {
    // ==================
    // Redemption Errors
    // ==================
    /// No code record matches the supplied token
    #[error("Verification code not found")]
    CodeNotFound,

    /// Code exists but is in a terminal state
    #[error("Verification code is {0}")]
    CodeNotActive(CodeStatus),

    /// Code has no remaining uses
    #[error("Verification code has no remaining uses")]
    CodeExhausted,

    /// Code deadline has passed
    #[error("Verification code has expired")]
    CodeExpired,

    /// Redemption fields did not match the bound credential
    #[error("Credential mismatch: matched {matched} of {required} required fields")]
    CredentialMismatch { matched: usize, required: usize },

    /// Code requires match fields the request did not supply
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingMatchFields(Vec<String>),

    // ==================
    // Issuance Errors
    // ==================
    /// Bulk request exceeds the batch ceiling
    #[error("Requested {requested} codes, batch ceiling is {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    /// Could not produce a unique code within the retry bound
    #[error("Code generation exhausted retry budget")]
    GenerationExhausted,

    /// Referenced credential does not exist
    #[error("Credential not found")]
    CredentialNotFound,

    // ==================
    // Profile Errors
    // ==================
    /// A profile already exists for this external identity
    #[error("Profile already exists for this identity")]
    ProfileExists,

    /// No profile for this external identity
    #[error("Profile not found")]
    ProfileNotFound,

    // ==================
    // Input / Access Errors
    // ==================
    /// Malformed or missing input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Access decision denied the request
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Daily query quota is spent
    #[error("Daily query limit of {limit} reached")]
    QuotaExhausted { limit: i64 },

    // ==================
    // Internal Errors
    // ==================
    /// Admin token missing or wrong
    #[error("Unauthorized")]
    Unauthorized,

    /// Conditional write lost too many races
    #[error("Concurrent update conflict")]
    ConcurrentUpdate,

    /// Secret hashing failed
    #[error("Internal error: hashing failed")]
    HashingFailed,

    /// Backing store failed
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl GateError {
    /// HTTP status for the admin surface.
    ///
    /// The chat webhook never uses this; business failures there ride a
    /// success status with the failure in the payload.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::InvalidInput(_) | GateError::MissingMatchFields(_) => 400,
            GateError::BatchTooLarge { .. } => 400,
            GateError::Unauthorized => 401,
            GateError::AccessDenied(_) | GateError::CredentialMismatch { .. } => 403,
            GateError::CodeNotFound
            | GateError::CredentialNotFound
            | GateError::ProfileNotFound => 404,
            GateError::CodeNotActive(_)
            | GateError::CodeExhausted
            | GateError::CodeExpired
            | GateError::ProfileExists
            | GateError::ConcurrentUpdate => 409,
            GateError::QuotaExhausted { .. } => 429,
            GateError::GenerationExhausted
            | GateError::HashingFailed
            | GateError::StorageError(_) => 500,
        }
    }

    /// Whether this is a client-caused error (logged at warn, not error)
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Instructional text for the chat surface, one distinct message per
    /// state so the user knows exactly what to do next.
    pub fn user_message(&self) -> String {
        match self {
            GateError::CodeNotFound => {
                "That verification code was not recognized. Please check the code and send it again.".to_string()
            }
            GateError::CodeNotActive(status) => match status {
                CodeStatus::Used => {
                    "This verification code has already been used.".to_string()
                }
                CodeStatus::Expired => {
                    "This verification code has expired. Please request a new one.".to_string()
                }
                CodeStatus::Disabled => {
                    "This verification code has been disabled. Please contact your administrator.".to_string()
                }
                CodeStatus::Active => "This verification code cannot be used right now.".to_string(),
            },
            GateError::CodeExhausted => {
                "This verification code has reached its maximum number of uses.".to_string()
            }
            GateError::CodeExpired => {
                "This verification code has expired. Please request a new one.".to_string()
            }
            GateError::CredentialMismatch { .. } => {
                "The details you provided do not match the intended recipient of this code.".to_string()
            }
            GateError::MissingMatchFields(fields) => {
                format!(
                    "This code is bound to a specific person. Please also provide: {}.",
                    fields.join(", ")
                )
            }
            GateError::QuotaExhausted { limit } => {
                format!("You have reached your daily limit of {limit} questions. Please come back tomorrow.")
            }
            GateError::AccessDenied(reason) => reason.clone(),
            _ => "Something went wrong on our side. Please try again in a moment.".to_string(),
        }
    }
}
