//! # Gate Protocol
//!
//! Per-message interception: look up the principal, demand a code from
//! unknown identities, redeem codes, and materialize authorized profiles.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use super::profile::{PrincipalProfile, ProfileRepository};
use super::ChatReply;
use crate::access::{self, Role, Tier};
use crate::core::config::{CodeShape, GateConfig};
use crate::core::error::{GateError, GateResult};
use crate::credential::CredentialRepository;
use crate::observability::{AuditAction, AuditLog, AuditOutcome, AuditRecord, Logger};
use crate::verification::{
    CodeRepository, RedemptionRequest, VerificationService,
};

/// An inbound webhook message
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// External messaging identity
    pub external_id: String,

    /// Display-name hint from the platform, if any
    pub display_name: Option<String>,

    /// Free-text message body
    pub text: String,
}

/// What interception decided for this message
#[derive(Debug)]
pub enum GateOutcome {
    /// Answer immediately with this reply (prompt, welcome, or rejection)
    Reply(ChatReply),

    /// The identity is authorized; route the message to query processing
    Authorized(PrincipalProfile),
}

/// Extracts code-shaped tokens from free text
struct CodeExtractor {
    pattern: Regex,
}

impl CodeExtractor {
    fn new(shape: &CodeShape) -> Self {
        // groups of alphabet characters separated by dashes or spaces;
        // lookalike characters are accepted here and cleaned up by
        // normalization before lookup
        let group = format!("[A-Za-z0-9]{{{}}}", shape.group_len);
        let pattern = format!(
            r"\b{group}(?:[-\s]{group}){{{}}}\b",
            shape.groups.saturating_sub(1)
        );
        Self {
            pattern: Regex::new(&pattern).expect("code pattern is built from numeric shape"),
        }
    }

    fn extract(&self, text: &str) -> Option<String> {
        self.pattern.find(text).map(|m| m.as_str().to_string())
    }
}

/// The gating protocol over the verification, profile, and credential stores
pub struct GateProtocol<C, P, R>
where
    C: CodeRepository,
    P: ProfileRepository,
    R: CredentialRepository,
{
    verification: VerificationService<C, R>,
    profiles: Arc<P>,
    audit: Arc<dyn AuditLog>,
    extractor: CodeExtractor,
}

impl<C, P, R> GateProtocol<C, P, R>
where
    C: CodeRepository,
    P: ProfileRepository,
    R: CredentialRepository,
{
    pub fn new(
        verification: VerificationService<C, R>,
        profiles: Arc<P>,
        audit: Arc<dyn AuditLog>,
        config: &GateConfig,
    ) -> Self {
        Self {
            verification,
            profiles,
            audit,
            extractor: CodeExtractor::new(&config.code_shape),
        }
    }

    /// Intercept one inbound message.
    ///
    /// Storage failures propagate as errors and the caller answers with a
    /// generic apology: the gate fails closed, never authorizing on a
    /// partial read.
    pub fn intercept(&self, message: &InboundMessage) -> GateResult<GateOutcome> {
        if let Some(profile) = self.profiles.find_by_external_id(&message.external_id)? {
            // Authorized: skip code handling entirely
            if let Err(e) = self.profiles.touch(profile.id, Utc::now()) {
                Logger::warn(
                    "PROFILE_TOUCH_FAILED",
                    &[("external_id", &message.external_id), ("error", &e.to_string())],
                );
            }
            return Ok(GateOutcome::Authorized(profile));
        }

        // Unknown identity: demand a code
        let Some(token) = self.extractor.extract(&message.text) else {
            return Ok(GateOutcome::Reply(Self::prompt_reply()));
        };

        // Verifying
        let request = RedemptionRequest {
            code: token,
            external_id: message.external_id.clone(),
            ..Default::default()
        };

        match self.verification.redeem(&request) {
            Ok(redemption) => {
                let profile = self.materialize_profile(message, &redemption)?;
                Ok(GateOutcome::Reply(Self::welcome_reply(&profile)))
            }
            Err(e) if e.is_client_error() => Ok(GateOutcome::Reply(
                ChatReply::text(e.user_message())
                    .with_action("I have a code", "verify"),
            )),
            Err(e) => Err(e),
        }
    }

    fn materialize_profile(
        &self,
        message: &InboundMessage,
        redemption: &crate::verification::Redemption,
    ) -> GateResult<PrincipalProfile> {
        let code = &redemption.code;
        let now = Utc::now();

        let profile = PrincipalProfile {
            id: Uuid::new_v4(),
            external_id: message.external_id.clone(),
            display_name: message
                .display_name
                .clone()
                .unwrap_or_else(|| message.external_id.clone()),
            role: code.role,
            tier: code.tier,
            department: redemption
                .credential
                .as_ref()
                .and_then(|c| c.department.clone()),
            private_namespace: code.namespace.clone(),
            credential_id: code.credential_id,
            verified_with_code: Some(code.code.clone()),
            first_contact_at: now,
            last_contact_at: now,
        };

        match self.profiles.create(&profile) {
            Ok(()) => {}
            // a concurrent message from the same identity won the create;
            // use the stored profile
            Err(GateError::ProfileExists) => {
                return self
                    .profiles
                    .find_by_external_id(&message.external_id)?
                    .ok_or(GateError::ProfileNotFound);
            }
            Err(e) => return Err(e),
        }

        let record = AuditRecord::new(AuditAction::ProfileCreated, AuditOutcome::Success)
            .with_external_id(message.external_id.clone())
            .with_code(code.code.clone())
            .with_principal(profile.id);
        if let Err(e) = self.audit.append(&record) {
            Logger::warn("AUDIT_APPEND_FAILED", &[("error", &e.to_string())]);
        }

        Ok(profile)
    }

    fn prompt_reply() -> ChatReply {
        ChatReply::text(
            "Welcome! This service requires a verification code.\n\
             Please send the code you received, e.g. ABC-DEF-GHJ-KLM.",
        )
        .with_action("What is a verification code?", "help code")
    }

    fn welcome_reply(profile: &PrincipalProfile) -> ChatReply {
        let access = profile.access_profile();
        let level = access::max_access_level(profile.role, profile.tier);
        let namespaces = access::accessible_namespaces(&access);

        ChatReply::text(format!(
            "You're verified, {}!\n\
             Role: {} · Plan: {}\n\
             Highest access level: {}\n\
             Knowledge areas available: {}",
            profile.display_name,
            profile.role.as_str(),
            profile.tier.as_str(),
            level.as_str(),
            namespaces.join(", "),
        ))
        .with_action("Ask a question", "help ask")
    }

    /// Administrative role/tier change, surfaced for the admin CLI/API
    pub fn set_role_tier(&self, id: Uuid, role: Role, tier: Tier) -> GateResult<PrincipalProfile> {
        self.profiles.set_role_tier(id, role, tier)
    }
}
