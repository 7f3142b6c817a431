//! # Code Store
//!
//! Repository contract for verification codes. The one operation with a
//! real concurrency hazard is redemption: two concurrent redemptions of a
//! single-use code must not both succeed, so the redemption write is a
//! conditional update keyed on the observed use count and status. Any
//! backing store must serialize that write (compare-and-swap, row lock, or
//! equivalent).

use std::sync::RwLock;

use uuid::Uuid;

use super::code::{CodeStatus, VerificationCode};
use crate::core::error::{GateError, GateResult};

/// Result of a conditional redemption write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemWrite {
    /// The write applied; `exhausted` reports whether this redemption
    /// consumed the final use (and the status flipped to `used` with it).
    Applied { exhausted: bool },

    /// The observed use count or status no longer matched; another
    /// redemption got there first.
    Conflict,
}

/// Verification code repository contract
pub trait CodeRepository: Send + Sync {
    fn insert(&self, code: &VerificationCode) -> GateResult<()>;

    /// Look up by normalized token
    fn find_by_code(&self, code: &str) -> GateResult<Option<VerificationCode>>;

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<VerificationCode>>;

    /// Whether a token already exists (any status) — used by generation
    fn token_exists(&self, code: &str) -> GateResult<bool>;

    /// Atomic conditional redemption. Applies only if the stored record
    /// still has `status == active` and `current_uses == expected_uses`;
    /// on success it appends `redeemed_by` to `used_by`, increments
    /// `current_uses`, and flips status to `used` in the same write when
    /// the increment reaches `max_uses`.
    fn redeem_conditional(
        &self,
        id: Uuid,
        expected_uses: u32,
        redeemed_by: &str,
    ) -> GateResult<RedeemWrite>;

    /// Persist a lazily-detected expiry (active → expired)
    fn mark_expired(&self, id: Uuid) -> GateResult<()>;

    /// Administrative disable (active → disabled)
    fn disable(&self, id: Uuid) -> GateResult<()>;

    /// List codes, optionally filtered by status
    fn list(&self, status: Option<CodeStatus>) -> GateResult<Vec<VerificationCode>>;
}

/// In-memory code repository. The write lock is the serialization point
/// for `redeem_conditional`.
#[derive(Debug, Default)]
pub struct InMemoryCodeRepository {
    codes: RwLock<Vec<VerificationCode>>,
}

impl InMemoryCodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> GateError {
        GateError::StorageError("code lock poisoned".to_string())
    }
}

impl CodeRepository for InMemoryCodeRepository {
    fn insert(&self, code: &VerificationCode) -> GateResult<()> {
        let mut codes = self.codes.write().map_err(|_| Self::lock_err())?;
        if codes.iter().any(|c| c.code == code.code) {
            return Err(GateError::StorageError(format!(
                "duplicate code token {}",
                code.code
            )));
        }
        codes.push(code.clone());
        Ok(())
    }

    fn find_by_code(&self, token: &str) -> GateResult<Option<VerificationCode>> {
        let codes = self.codes.read().map_err(|_| Self::lock_err())?;
        Ok(codes.iter().find(|c| c.code == token).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> GateResult<Option<VerificationCode>> {
        let codes = self.codes.read().map_err(|_| Self::lock_err())?;
        Ok(codes.iter().find(|c| c.id == id).cloned())
    }

    fn token_exists(&self, token: &str) -> GateResult<bool> {
        let codes = self.codes.read().map_err(|_| Self::lock_err())?;
        Ok(codes.iter().any(|c| c.code == token))
    }

    fn redeem_conditional(
        &self,
        id: Uuid,
        expected_uses: u32,
        redeemed_by: &str,
    ) -> GateResult<RedeemWrite> {
        let mut codes = self.codes.write().map_err(|_| Self::lock_err())?;
        let code = codes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CodeNotFound)?;

        // the compare half of the compare-and-swap
        if code.status != CodeStatus::Active || code.current_uses != expected_uses {
            return Ok(RedeemWrite::Conflict);
        }

        code.used_by.push(redeemed_by.to_string());
        code.current_uses += 1;
        let exhausted = code.current_uses >= code.max_uses;
        if exhausted {
            code.status = CodeStatus::Used;
        }

        Ok(RedeemWrite::Applied { exhausted })
    }

    fn mark_expired(&self, id: Uuid) -> GateResult<()> {
        let mut codes = self.codes.write().map_err(|_| Self::lock_err())?;
        let code = codes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CodeNotFound)?;

        if code.status == CodeStatus::Active {
            code.status = CodeStatus::Expired;
        }
        Ok(())
    }

    fn disable(&self, id: Uuid) -> GateResult<()> {
        let mut codes = self.codes.write().map_err(|_| Self::lock_err())?;
        let code = codes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GateError::CodeNotFound)?;

        if code.status == CodeStatus::Active {
            code.status = CodeStatus::Disabled;
        }
        Ok(())
    }

    fn list(&self, status: Option<CodeStatus>) -> GateResult<Vec<VerificationCode>> {
        let codes = self.codes.read().map_err(|_| Self::lock_err())?;
        Ok(codes
            .iter()
            .filter(|c| status.map(|s| c.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Role, Tier};
    use chrono::Utc;

    fn sample(token: &str, max_uses: u32) -> VerificationCode {
        VerificationCode {
            id: Uuid::new_v4(),
            code: token.to_string(),
            status: CodeStatus::Active,
            max_uses,
            current_uses: 0,
            expires_at: None,
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
    fn test_conditional_redeem_applies_once() {
        let repo = InMemoryCodeRepository::new();
        let code = sample("AAA-BBB-CCC-DDD", 1);
        repo.insert(&code).unwrap();

        let first = repo.redeem_conditional(code.id, 0, "user-1").unwrap();
        assert_eq!(first, RedeemWrite::Applied { exhausted: true });

        // same expected_uses now conflicts: the stored state moved on
        let second = repo.redeem_conditional(code.id, 0, "user-2").unwrap();
        assert_eq!(second, RedeemWrite::Conflict);

        let stored = repo.find_by_id(code.id).unwrap().unwrap();
        assert_eq!(stored.status, CodeStatus::Used);
        assert_eq!(stored.current_uses, 1);
        assert_eq!(stored.used_by, vec!["user-1"]);
    }

    #[test]
    fn test_multi_use_exhausts_exactly_at_max() {
        let repo = InMemoryCodeRepository::new();
        let code = sample("AAA-BBB-CCC-DDD", 3);
        repo.insert(&code).unwrap();

        for n in 0..3u32 {
            let write = repo
                .redeem_conditional(code.id, n, &format!("user-{n}"))
                .unwrap();
            assert_eq!(write, RedeemWrite::Applied { exhausted: n == 2 });
        }

        let stored = repo.find_by_id(code.id).unwrap().unwrap();
        assert_eq!(stored.current_uses, 3);
        assert_eq!(stored.status, CodeStatus::Used);
        assert!(stored.current_uses <= stored.max_uses);
    }

    #[test]
    fn test_redeem_conflicts_on_terminal_status() {
        let repo = InMemoryCodeRepository::new();
        let code = sample("AAA-BBB-CCC-DDD", 5);
        repo.insert(&code).unwrap();
        repo.disable(code.id).unwrap();

        let write = repo.redeem_conditional(code.id, 0, "user-1").unwrap();
        assert_eq!(write, RedeemWrite::Conflict);
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let repo = InMemoryCodeRepository::new();
        repo.insert(&sample("AAA-BBB-CCC-DDD", 1)).unwrap();
        assert!(repo.insert(&sample("AAA-BBB-CCC-DDD", 1)).is_err());
    }

    #[test]
    fn test_list_filters_by_status() {
        let repo = InMemoryCodeRepository::new();
        let active = sample("AAA-BBB-CCC-DDD", 1);
        let disabled = sample("EEE-FFF-GGG-HHH", 1);
        repo.insert(&active).unwrap();
        repo.insert(&disabled).unwrap();
        repo.disable(disabled.id).unwrap();

        assert_eq!(repo.list(None).unwrap().len(), 2);
        assert_eq!(repo.list(Some(CodeStatus::Active)).unwrap().len(), 1);
        assert_eq!(repo.list(Some(CodeStatus::Disabled)).unwrap().len(), 1);
    }
}
