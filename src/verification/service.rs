//! # Verification Service
//!
//! Issuance and redemption of verification codes. Redemption evaluates its
//! checks in a strict order and short-circuits on the first failure, each
//! failure carrying a distinct user-facing message. The redemption write
//! itself is a conditional update (see `store`); this service retries lost
//! races while the code still has capacity and reports exhaustion when the
//! race consumed the final use.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::code::{CodeStatus, MatchField, VerificationCode};
use super::generate;
use super::store::{CodeRepository, RedeemWrite};
use crate::access::{Role, Tier};
use crate::core::config::{CodeDefaults, CodeShape, GateConfig};
use crate::core::error::{GateError, GateResult};
use crate::credential::{CreateCredential, Credential, CredentialRepository};
use crate::observability::{AuditAction, AuditLog, AuditOutcome, AuditRecord, Logger};

/// Bound on conditional-write retries while a contended code still has
/// remaining capacity
const REDEEM_RETRY_BOUND: u32 = 8;

/// A redemption attempt
#[derive(Debug, Clone, Default)]
pub struct RedemptionRequest {
    /// Raw token as typed by the user; normalized before lookup
    pub code: String,

    /// External messaging identity performing the redemption
    pub external_id: String,

    pub provided_email: Option<String>,
    pub provided_employee_id: Option<String>,
    pub provided_name: Option<String>,
    pub provided_phone: Option<String>,
}

impl RedemptionRequest {
    fn provided(&self, field: MatchField) -> Option<&str> {
        match field {
            MatchField::Email => self.provided_email.as_deref(),
            MatchField::EmployeeId => self.provided_employee_id.as_deref(),
            MatchField::Name => self.provided_name.as_deref(),
            MatchField::Phone => self.provided_phone.as_deref(),
        }
    }
}

/// A successful redemption: the post-write code snapshot and the credential
/// it was verified against, if any
#[derive(Debug, Clone)]
pub struct Redemption {
    pub code: VerificationCode,
    pub credential: Option<Credential>,
}

/// Code issuance request; unset fields fall back to the configured defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequest {
    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub tier: Option<Tier>,

    /// Expiry horizon in days; unset uses the default, `0` means never
    #[serde(default)]
    pub expires_in_days: Option<u32>,

    #[serde(default)]
    pub max_uses: Option<u32>,

    /// Private namespace attached to the resulting principal
    #[serde(default)]
    pub namespace: Option<String>,

    /// Bind to an existing credential
    #[serde(default)]
    pub credential_id: Option<Uuid>,

    /// Or create and bind an inline credential
    #[serde(default)]
    pub credential: Option<CreateCredential>,

    #[serde(default)]
    pub requires_credential_match: bool,

    #[serde(default)]
    pub match_fields: Vec<MatchField>,
}

/// Per-row override in a bulk issuance
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkIssueRow {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub credential_id: Option<Uuid>,
    #[serde(default)]
    pub credential: Option<CreateCredential>,
}

/// Bulk issuance: shared defaults plus optional per-row overrides.
/// When `rows` is non-empty it determines the batch size.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkIssueRequest {
    #[serde(default)]
    pub count: usize,

    #[serde(flatten)]
    pub shared: IssueRequest,

    #[serde(default)]
    pub rows: Vec<BulkIssueRow>,
}

/// An issued code with its bound credential summary
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: VerificationCode,
    pub credential: Option<Credential>,
}

/// Issuance and redemption over a code store and a credential store
pub struct VerificationService<C: CodeRepository, R: CredentialRepository> {
    codes: Arc<C>,
    credentials: Arc<R>,
    audit: Arc<dyn AuditLog>,
    defaults: CodeDefaults,
    shape: CodeShape,
    batch_ceiling: usize,
}

impl<C: CodeRepository, R: CredentialRepository> VerificationService<C, R> {
    pub fn new(
        codes: Arc<C>,
        credentials: Arc<R>,
        audit: Arc<dyn AuditLog>,
        config: &GateConfig,
    ) -> Self {
        Self {
            codes,
            credentials,
            audit,
            defaults: config.defaults.clone(),
            shape: config.code_shape.clone(),
            batch_ceiling: config.batch_ceiling,
        }
    }

    // ==================
    // Issuance
    // ==================

    /// Issue a single code
    pub fn issue(&self, request: IssueRequest) -> GateResult<IssuedCode> {
        let credential = self.resolve_binding(&request)?;

        if request.requires_credential_match && credential.is_none() {
            return Err(GateError::InvalidInput(
                "requires_credential_match needs a bound credential".to_string(),
            ));
        }

        let token = self.unique_token()?;
        let now = Utc::now();

        let horizon = request.expires_in_days.or(self.defaults.expiry_days);
        let expires_at = match horizon {
            None | Some(0) => None,
            Some(days) => Some(now + Duration::days(i64::from(days))),
        };

        let code = VerificationCode {
            id: Uuid::new_v4(),
            code: token,
            status: CodeStatus::Active,
            max_uses: request.max_uses.unwrap_or(self.defaults.max_uses).max(1),
            current_uses: 0,
            expires_at,
            credential_id: credential.as_ref().map(|c| c.id),
            requires_credential_match: request.requires_credential_match,
            match_fields: request.match_fields,
            role: request.role.unwrap_or(self.defaults.role),
            tier: request.tier.unwrap_or(self.defaults.tier),
            namespace: request.namespace,
            used_by: Vec::new(),
            created_at: now,
        };

        self.codes.insert(&code)?;

        let mut record = AuditRecord::new(AuditAction::CodeIssued, AuditOutcome::Success)
            .with_code(code.code.clone());
        if let Some(cred) = &credential {
            record = record.with_credential(cred.id);
        }
        self.record(record);

        Ok(IssuedCode { code, credential })
    }

    /// Issue a batch of codes, up to the configured ceiling
    pub fn issue_bulk(&self, request: BulkIssueRequest) -> GateResult<Vec<IssuedCode>> {
        let total = if request.rows.is_empty() {
            request.count
        } else {
            request.rows.len()
        };

        if total == 0 {
            return Err(GateError::InvalidInput(
                "bulk issuance needs a count or rows".to_string(),
            ));
        }
        if total > self.batch_ceiling {
            return Err(GateError::BatchTooLarge {
                requested: total,
                limit: self.batch_ceiling,
            });
        }

        let mut issued = Vec::with_capacity(total);
        if request.rows.is_empty() {
            for _ in 0..total {
                issued.push(self.issue(request.shared.clone())?);
            }
        } else {
            for row in request.rows {
                let mut merged = request.shared.clone();
                merged.role = row.role.or(merged.role);
                merged.tier = row.tier.or(merged.tier);
                merged.namespace = row.namespace.or(merged.namespace);
                merged.credential_id = row.credential_id.or(merged.credential_id);
                merged.credential = row.credential.or(merged.credential);
                issued.push(self.issue(merged)?);
            }
        }

        Ok(issued)
    }

    /// Administratively disable an active code
    pub fn disable(&self, token: &str) -> GateResult<()> {
        let normalized = generate::normalize(token);
        let code = self
            .codes
            .find_by_code(&normalized)?
            .ok_or(GateError::CodeNotFound)?;
        self.codes.disable(code.id)?;

        self.record(
            AuditRecord::new(AuditAction::CodeDisabled, AuditOutcome::Success)
                .with_code(normalized),
        );
        Ok(())
    }

    /// List codes for administrative callers
    pub fn list(&self, status: Option<CodeStatus>) -> GateResult<Vec<VerificationCode>> {
        self.codes.list(status)
    }

    // ==================
    // Redemption
    // ==================

    /// Redeem a code. Checks run in order: existence, status, exhaustion,
    /// expiry, credential match; the first failure wins. Every attempt is
    /// audited, success or not.
    pub fn redeem(&self, request: &RedemptionRequest) -> GateResult<Redemption> {
        let token = generate::normalize(&request.code);
        let result = self.redeem_inner(&token, request);

        match &result {
            Ok(redemption) => {
                let mut record =
                    AuditRecord::new(AuditAction::RedemptionSucceeded, AuditOutcome::Success)
                        .with_external_id(request.external_id.clone())
                        .with_code(token.clone());
                if let Some(cred) = &redemption.credential {
                    record = record.with_credential(cred.id);
                }
                self.record(record);
            }
            Err(e) => {
                self.record(
                    AuditRecord::new(AuditAction::RedemptionRejected, AuditOutcome::Rejected)
                        .with_external_id(request.external_id.clone())
                        .with_code(token.clone())
                        .with_detail(e.to_string()),
                );
            }
        }

        result
    }

    fn redeem_inner(&self, token: &str, request: &RedemptionRequest) -> GateResult<Redemption> {
        for _ in 0..REDEEM_RETRY_BOUND {
            let code = self
                .codes
                .find_by_code(token)?
                .ok_or(GateError::CodeNotFound)?;

            if code.status != CodeStatus::Active {
                return Err(GateError::CodeNotActive(code.status));
            }
            if code.current_uses >= code.max_uses {
                return Err(GateError::CodeExhausted);
            }
            if code.is_expired(Utc::now()) {
                // persist the lazily-detected transition; best-effort
                let _ = self.codes.mark_expired(code.id);
                return Err(GateError::CodeExpired);
            }

            let credential = if code.requires_credential_match {
                Some(self.match_credential(&code, request)?)
            } else {
                match code.credential_id {
                    Some(id) => self.credentials.find_by_id(id)?,
                    None => None,
                }
            };

            match self
                .codes
                .redeem_conditional(code.id, code.current_uses, &request.external_id)?
            {
                RedeemWrite::Applied { .. } => {
                    if let Some(cred) = &credential {
                        // pending → verified; failure must not undo the redemption
                        if let Err(e) = self.credentials.verify(cred.id) {
                            Logger::warn(
                                "CREDENTIAL_VERIFY_FAILED",
                                &[("credential_id", &cred.id.to_string()), ("error", &e.to_string())],
                            );
                        }
                    }
                    let updated = self
                        .codes
                        .find_by_id(code.id)?
                        .ok_or(GateError::CodeNotFound)?;
                    return Ok(Redemption {
                        code: updated,
                        credential,
                    });
                }
                RedeemWrite::Conflict => {
                    let current = self
                        .codes
                        .find_by_id(code.id)?
                        .ok_or(GateError::CodeNotFound)?;

                    // racing loser: the concurrent winner took the last use
                    if current.status == CodeStatus::Used
                        || current.current_uses >= current.max_uses
                    {
                        return Err(GateError::CodeExhausted);
                    }
                    if current.status != CodeStatus::Active {
                        return Err(GateError::CodeNotActive(current.status));
                    }
                    // capacity remains; retry the conditional write
                }
            }
        }

        Err(GateError::ConcurrentUpdate)
    }

    fn match_credential(
        &self,
        code: &VerificationCode,
        request: &RedemptionRequest,
    ) -> GateResult<Credential> {
        let credential_id = code.credential_id.ok_or(GateError::CredentialNotFound)?;
        let credential = self
            .credentials
            .find_by_id(credential_id)?
            .ok_or(GateError::CredentialNotFound)?;

        let fields: Vec<MatchField> = if code.match_fields.is_empty() {
            vec![MatchField::Email, MatchField::EmployeeId]
        } else {
            code.match_fields.clone()
        };

        let missing: Vec<String> = fields
            .iter()
            .filter(|f| request.provided(**f).is_none())
            .map(|f| f.as_str().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(GateError::MissingMatchFields(missing));
        }

        let mut matched = 0usize;
        for field in &fields {
            let expected = match field {
                MatchField::Email => credential.email.as_deref(),
                MatchField::EmployeeId => Some(credential.external_id.as_str()),
                MatchField::Name => Some(credential.full_name.as_str()),
                MatchField::Phone => credential.phone.as_deref(),
            };
            let provided = request.provided(*field);

            let is_match = match (expected, provided) {
                (Some(e), Some(p)) => e.trim().to_lowercase() == p.trim().to_lowercase(),
                _ => false,
            };
            if is_match {
                matched += 1;
            }
        }

        if matched == fields.len() {
            Ok(credential)
        } else {
            Err(GateError::CredentialMismatch {
                matched,
                required: fields.len(),
            })
        }
    }

    // ==================
    // Internals
    // ==================

    /// Resolve the credential a code should be bound to: an existing id,
    /// inline credential data (created and bound), or nothing
    fn resolve_binding(&self, request: &IssueRequest) -> GateResult<Option<Credential>> {
        if let Some(id) = request.credential_id {
            let credential = self
                .credentials
                .find_by_id(id)?
                .ok_or(GateError::CredentialNotFound)?;
            return Ok(Some(credential));
        }

        if let Some(input) = &request.credential {
            let credential = Credential::new(input.clone())?;
            return Ok(Some(self.credentials.create(&credential)?));
        }

        Ok(None)
    }

    fn unique_token(&self) -> GateResult<String> {
        for _ in 0..self.shape.max_attempts {
            let token = generate::generate_token(&self.shape);
            if !self.codes.token_exists(&token)? {
                return Ok(token);
            }
        }
        Err(GateError::GenerationExhausted)
    }

    /// Audit is best-effort; a failed append is logged and swallowed
    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.append(&record) {
            Logger::warn(
                "AUDIT_APPEND_FAILED",
                &[("action", record.action.as_str()), ("error", &e.to_string())],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::InMemoryCredentialRepository;
    use crate::observability::MemoryAuditLog;
    use crate::verification::store::InMemoryCodeRepository;

    fn service() -> (
        VerificationService<InMemoryCodeRepository, InMemoryCredentialRepository>,
        Arc<InMemoryCodeRepository>,
        Arc<InMemoryCredentialRepository>,
        Arc<MemoryAuditLog>,
    ) {
        let codes = Arc::new(InMemoryCodeRepository::new());
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let svc = VerificationService::new(
            Arc::clone(&codes),
            Arc::clone(&credentials),
            audit.clone() as Arc<dyn AuditLog>,
            &GateConfig::default(),
        );
        (svc, codes, credentials, audit)
    }

    fn redemption(code: &str, who: &str) -> RedemptionRequest {
        RedemptionRequest {
            code: code.to_string(),
            external_id: who.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_issue_uses_configured_defaults() {
        let (svc, _, _, _) = service();
        let issued = svc.issue(IssueRequest::default()).unwrap();

        assert_eq!(issued.code.role, Role::User);
        assert_eq!(issued.code.tier, Tier::Free);
        assert_eq!(issued.code.max_uses, 1);
        assert!(issued.code.expires_at.is_some());
        assert_eq!(issued.code.status, CodeStatus::Active);
    }

    #[test]
    fn test_issue_zero_horizon_means_never_expires() {
        let (svc, _, _, _) = service();
        let issued = svc
            .issue(IssueRequest {
                expires_in_days: Some(0),
                ..Default::default()
            })
            .unwrap();
        assert!(issued.code.expires_at.is_none());
    }

    #[test]
    fn test_redeem_round_trip_carries_payload() {
        let (svc, _, _, _) = service();
        let issued = svc
            .issue(IssueRequest {
                role: Some(Role::Senior),
                tier: Some(Tier::Pro),
                namespace: Some("ns-emp-7".to_string()),
                ..Default::default()
            })
            .unwrap();

        let redeemed = svc.redeem(&redemption(&issued.code.code, "chat-7")).unwrap();

        assert_eq!(redeemed.code.role, Role::Senior);
        assert_eq!(redeemed.code.tier, Tier::Pro);
        assert_eq!(redeemed.code.namespace.as_deref(), Some("ns-emp-7"));
        assert_eq!(redeemed.code.status, CodeStatus::Used);
        assert_eq!(redeemed.code.used_by, vec!["chat-7"]);
    }

    #[test]
    fn test_redeem_unknown_code() {
        let (svc, _, _, _) = service();
        let err = svc
            .redeem(&redemption("ZZZ-ZZZ-ZZZ-ZZZ", "chat-1"))
            .unwrap_err();
        assert!(matches!(err, GateError::CodeNotFound));
    }

    #[test]
    fn test_redeem_used_code_reports_terminal_state() {
        let (svc, _, _, _) = service();
        let issued = svc.issue(IssueRequest::default()).unwrap();

        svc.redeem(&redemption(&issued.code.code, "chat-1")).unwrap();
        let err = svc
            .redeem(&redemption(&issued.code.code, "chat-2"))
            .unwrap_err();
        assert!(matches!(err, GateError::CodeNotActive(CodeStatus::Used)));
    }

    #[test]
    fn test_redeem_expired_code_fails_even_with_uses_left() {
        let (svc, codes, _, _) = service();

        // a still-active code whose deadline already passed
        let stale = VerificationCode {
            id: Uuid::new_v4(),
            code: "AAA-BBB-CCC-DDD".to_string(),
            status: CodeStatus::Active,
            max_uses: 5,
            current_uses: 0,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            credential_id: None,
            requires_credential_match: false,
            match_fields: Vec::new(),
            role: Role::User,
            tier: Tier::Free,
            namespace: None,
            used_by: Vec::new(),
            created_at: Utc::now() - Duration::days(31),
        };
        codes.insert(&stale).unwrap();

        let err = svc
            .redeem(&redemption("AAA-BBB-CCC-DDD", "chat-1"))
            .unwrap_err();
        assert!(matches!(err, GateError::CodeExpired));

        // the lazy transition was persisted
        let stored = codes.find_by_id(stale.id).unwrap().unwrap();
        assert_eq!(stored.status, CodeStatus::Expired);
    }

    #[test]
    fn test_redeem_disabled_code() {
        let (svc, _, _, _) = service();
        let issued = svc.issue(IssueRequest::default()).unwrap();
        svc.disable(&issued.code.code).unwrap();

        let err = svc
            .redeem(&redemption(&issued.code.code, "chat-1"))
            .unwrap_err();
        assert!(matches!(
            err,
            GateError::CodeNotActive(CodeStatus::Disabled)
        ));
    }

    #[test]
    fn test_redeem_normalizes_token_input() {
        let (svc, _, _, _) = service();
        let issued = svc.issue(IssueRequest::default()).unwrap();
        let sloppy = issued.code.code.to_lowercase().replace('-', " ");

        let redeemed = svc.redeem(&redemption(&sloppy, "chat-1")).unwrap();
        assert_eq!(redeemed.code.id, issued.code.id);
    }

    #[test]
    fn test_credential_match_requires_fields() {
        let (svc, _, _, _) = service();
        let issued = svc
            .issue(IssueRequest {
                credential: Some(CreateCredential {
                    external_id: "emp-9".to_string(),
                    full_name: "Choi".to_string(),
                    email: Some("choi@example.com".to_string()),
                    ..Default::default()
                }),
                requires_credential_match: true,
                match_fields: vec![MatchField::Email],
                ..Default::default()
            })
            .unwrap();

        // nothing provided: the reply lists what is missing
        let err = svc
            .redeem(&redemption(&issued.code.code, "chat-9"))
            .unwrap_err();
        assert!(matches!(err, GateError::MissingMatchFields(ref f) if f == &vec!["email".to_string()]));

        // wrong value: mismatch
        let mut bad = redemption(&issued.code.code, "chat-9");
        bad.provided_email = Some("other@example.com".to_string());
        let err = svc.redeem(&bad).unwrap_err();
        assert!(matches!(err, GateError::CredentialMismatch { .. }));

        // case-insensitive exact match succeeds and verifies the credential
        let mut good = redemption(&issued.code.code, "chat-9");
        good.provided_email = Some("  CHOI@example.com ".to_string());
        let redeemed = svc.redeem(&good).unwrap();
        let cred = redeemed.credential.unwrap();
        assert_eq!(cred.external_id, "emp-9");
    }

    #[test]
    fn test_bulk_issuance_respects_ceiling() {
        let (svc, _, _, _) = service();
        let err = svc
            .issue_bulk(BulkIssueRequest {
                count: 101,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            GateError::BatchTooLarge {
                requested: 101,
                limit: 100
            }
        ));
    }

    #[test]
    fn test_bulk_issuance_row_overrides() {
        let (svc, _, _, _) = service();
        let issued = svc
            .issue_bulk(BulkIssueRequest {
                count: 0,
                shared: IssueRequest {
                    role: Some(Role::Junior),
                    tier: Some(Tier::Basic),
                    ..Default::default()
                },
                rows: vec![
                    BulkIssueRow::default(),
                    BulkIssueRow {
                        role: Some(Role::Manager),
                        tier: Some(Tier::Pro),
                        ..Default::default()
                    },
                ],
            })
            .unwrap();

        assert_eq!(issued.len(), 2);
        assert_eq!(issued[0].code.role, Role::Junior);
        assert_eq!(issued[1].code.role, Role::Manager);
        assert_eq!(issued[1].code.tier, Tier::Pro);
        // every generated token is unique
        assert_ne!(issued[0].code.code, issued[1].code.code);
    }

    #[test]
    fn test_every_attempt_is_audited() {
        let (svc, _, _, audit) = service();
        let issued = svc.issue(IssueRequest::default()).unwrap();

        let _ = svc.redeem(&redemption("ZZZ-ZZZ-ZZZ-ZZZ", "chat-1"));
        let _ = svc.redeem(&redemption(&issued.code.code, "chat-1"));

        assert_eq!(audit.records_for(AuditAction::CodeIssued).len(), 1);
        assert_eq!(audit.records_for(AuditAction::RedemptionRejected).len(), 1);
        assert_eq!(audit.records_for(AuditAction::RedemptionSucceeded).len(), 1);

        let rejected = &audit.records_for(AuditAction::RedemptionRejected)[0];
        assert!(rejected.detail.is_some());
    }
}
