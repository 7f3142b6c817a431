//! # Private Identifier Hashing
//!
//! Private identifiers (national id numbers and the like) are never stored
//! in cleartext; only an Argon2id hash is persisted.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::core::error::{GateError, GateResult};

/// Hash a private identifier with Argon2id
pub fn hash_private_id(private_id: &str) -> GateResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(private_id.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| GateError::HashingFailed)
}

/// Verify a private identifier against its stored hash
pub fn verify_private_id(private_id: &str, hash: &str) -> GateResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| GateError::StorageError("malformed private id hash".to_string()))?;

    Ok(Argon2::default()
        .verify_password(private_id.as_bytes(), &parsed)
        .is_ok())
}
