//! # Admin Surface Authentication
//!
//! The administrative routes are guarded by a static bearer token. Only a
//! SHA-256 hash of the token is configured at rest, and the comparison is
//! constant-time.

use axum::http::HeaderMap;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::core::error::{GateError, GateResult};

/// Hash a bearer token for storage (SHA-256, url-safe base64)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time comparison of two strings
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Authorize an admin request against the configured token hash.
///
/// `None` for the hash disables the admin surface entirely: every request
/// is rejected.
pub fn authorize(headers: &HeaderMap, expected_hash: Option<&str>) -> GateResult<()> {
    let Some(expected) = expected_hash else {
        return Err(GateError::Unauthorized);
    };

    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(GateError::Unauthorized)?;

    if constant_time_str_eq(&hash_token(presented), expected) {
        Ok(())
    } else {
        Err(GateError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_correct_token_authorizes() {
        let hash = hash_token("secret-token");
        assert!(authorize(&headers_with("secret-token"), Some(&hash)).is_ok());
    }

    #[test]
    fn test_wrong_token_rejected() {
        let hash = hash_token("secret-token");
        assert!(authorize(&headers_with("other-token"), Some(&hash)).is_err());
    }

    #[test]
    fn test_missing_header_rejected() {
        let hash = hash_token("secret-token");
        assert!(authorize(&HeaderMap::new(), Some(&hash)).is_err());
    }

    #[test]
    fn test_unconfigured_hash_disables_surface() {
        assert!(authorize(&headers_with("anything"), None).is_err());
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }
}
