//! # Query Dispatch & Namespace Isolation
//!
//! Every authorized query is scoped to the namespaces the access engine
//! grants the principal, plus the principal's private namespace for
//! personal-data queries. The namespace restriction is a mandatory
//! parameter of every retrieval call; there is no unscoped search and no
//! post-filtering of results.
//!
//! The user-visible answer path races the retrieval/completion pipeline
//! against an explicit timeout. On timeout the caller gets an immediate
//! "still thinking" reply with a retry affordance while the pipeline runs
//! to completion on its worker and logs its result; the logging path never
//! blocks or fails the user-visible path.

pub mod log;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::access;
use crate::core::config::GateConfig;
use crate::core::error::{GateError, GateResult};
use crate::observability::{AuditAction, AuditLog, AuditOutcome, AuditRecord, Logger};
use crate::onboarding::{ChatReply, PrincipalProfile};
use crate::ratelimit::RateLimiter;
use self::log::{QueryLogEntry, QueryLogRepository, QueryOutcome};

/// Message prefix routing a query to the principal's private namespace
const PERSONAL_PREFIX: &str = "my:";

/// A retrieved passage with its owning namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub namespace: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Namespace-scoped retrieval over the external knowledge store.
///
/// The namespace list is not optional: a query on behalf of principal P
/// must never retrieve content owned by a namespace outside
/// `accessible_namespaces(P) ∪ {P.private_namespace}`.
pub trait KnowledgeStore: Send + Sync {
    fn search(&self, query: &str, namespaces: &[String], top_k: usize)
        -> GateResult<Vec<Passage>>;
}

/// External completion service turning passages into an answer
pub trait CompletionClient: Send + Sync {
    fn complete(&self, question: &str, context: &[Passage]) -> GateResult<String>;
}

/// Stand-in knowledge store for deployments where no retrieval provider
/// has been wired yet; every search comes back empty.
pub struct UnconfiguredKnowledgeStore;

impl KnowledgeStore for UnconfiguredKnowledgeStore {
    fn search(&self, _: &str, _: &[String], _: usize) -> GateResult<Vec<Passage>> {
        Ok(Vec::new())
    }
}

/// Extractive answerer: quotes the best passages instead of calling an
/// external completion service. Useful as a default and in tests.
pub struct ExtractiveCompletion;

impl CompletionClient for ExtractiveCompletion {
    fn complete(&self, _question: &str, context: &[Passage]) -> GateResult<String> {
        if context.is_empty() {
            return Ok(
                "I couldn't find anything about that in the areas available to you.".to_string(),
            );
        }
        let mut best: Vec<&Passage> = context.iter().collect();
        best.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(best
            .iter()
            .take(3)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Query processing behind the gate: rate limit, scope, dispatch, log
pub struct QueryService {
    knowledge: Arc<dyn KnowledgeStore>,
    completion: Arc<dyn CompletionClient>,
    query_log: Arc<dyn QueryLogRepository>,
    audit: Arc<dyn AuditLog>,
    limiter: RateLimiter,
    timeout: Duration,
    top_k: usize,
}

impl QueryService {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        completion: Arc<dyn CompletionClient>,
        query_log: Arc<dyn QueryLogRepository>,
        audit: Arc<dyn AuditLog>,
        limiter: RateLimiter,
        config: &GateConfig,
    ) -> Self {
        Self {
            knowledge,
            completion,
            query_log,
            audit,
            limiter,
            timeout: Duration::from_millis(config.query.timeout_ms),
            top_k: config.query.top_k,
        }
    }

    /// Answer a query for an authorized principal.
    ///
    /// Rate limiting and namespace scoping run inline before any expensive
    /// downstream call. Never returns an error: every failure mode maps to
    /// an instructional reply.
    pub async fn answer(&self, profile: &PrincipalProfile, text: &str) -> ChatReply {
        // quota first, before anything expensive
        let decision = self.limiter.check(profile.id, profile.tier);
        if !decision.allowed {
            self.record(
                AuditRecord::new(AuditAction::QueryDenied, AuditOutcome::Rejected)
                    .with_principal(profile.id)
                    .with_detail(format!("daily limit {}", decision.limit)),
            );
            return ChatReply::text(
                GateError::QuotaExhausted {
                    limit: decision.limit,
                }
                .user_message(),
            );
        }

        let (namespaces, question) = Self::scope(profile, text);
        let Some(namespaces) = namespaces else {
            // personal query without a private namespace bound at onboarding
            return ChatReply::text(
                "You don't have a personal data area set up. \
                 Please contact your administrator.",
            );
        };

        let worker = {
            let knowledge = Arc::clone(&self.knowledge);
            let completion = Arc::clone(&self.completion);
            let query_log = Arc::clone(&self.query_log);
            let audit = Arc::clone(&self.audit);
            let principal_id = profile.id;
            let external_id = profile.external_id.clone();
            let question = question.clone();
            let top_k = self.top_k;

            tokio::task::spawn_blocking(move || -> ChatReply {
                let started = Instant::now();

                let result = knowledge
                    .search(&question, &namespaces, top_k)
                    .and_then(|passages| completion.complete(&question, &passages));

                match result {
                    Ok(answer) => {
                        let mut entry =
                            QueryLogEntry::new(principal_id, &external_id, &question);
                        entry.namespaces = namespaces;
                        entry.response_text = Some(answer.clone());
                        entry.response_time_ms = Some(started.elapsed().as_millis() as u64);
                        entry.outcome = QueryOutcome::Answered;
                        if let Err(e) = query_log.append(&entry) {
                            Logger::warn("QUERY_LOG_FAILED", &[("error", &e.to_string())]);
                        }
                        if let Err(e) = audit.append(
                            &AuditRecord::new(AuditAction::QueryAnswered, AuditOutcome::Success)
                                .with_principal(principal_id),
                        ) {
                            Logger::warn("AUDIT_APPEND_FAILED", &[("error", &e.to_string())]);
                        }
                        ChatReply::text(answer)
                    }
                    Err(e) => {
                        Logger::error(
                            "QUERY_PIPELINE_FAILED",
                            &[
                                ("principal_id", &principal_id.to_string()),
                                ("error", &e.to_string()),
                            ],
                        );
                        if let Err(audit_err) = audit.append(
                            &AuditRecord::new(AuditAction::QueryFailed, AuditOutcome::Failed)
                                .with_principal(principal_id)
                                .with_detail(e.to_string()),
                        ) {
                            Logger::warn(
                                "AUDIT_APPEND_FAILED",
                                &[("error", &audit_err.to_string())],
                            );
                        }
                        ChatReply::text(
                            "Something went wrong while looking that up. \
                             Please try again in a moment.",
                        )
                    }
                }
            })
        };

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(join_err)) => {
                Logger::error("QUERY_WORKER_PANICKED", &[("error", &join_err.to_string())]);
                ChatReply::text(
                    "Something went wrong while looking that up. \
                     Please try again in a moment.",
                )
            }
            Err(_elapsed) => {
                // the worker keeps running and logs its result when done;
                // the caller moves on with a retry affordance
                self.record(
                    AuditRecord::new(AuditAction::QueryDeferred, AuditOutcome::Deferred)
                        .with_principal(profile.id),
                );
                ChatReply::text(
                    "Still thinking about that one. \
                     Give me a moment and tap the button below.",
                )
                .with_action("Done thinking?", text)
            }
        }
    }

    /// Resolve the namespace scope for a message.
    ///
    /// Returns `(None, _)` only for a personal-data query from a principal
    /// with no private namespace. Otherwise the scope is exactly the
    /// accessible namespaces, or exclusively the private namespace for
    /// personal-data queries.
    fn scope(profile: &PrincipalProfile, text: &str) -> (Option<Vec<String>>, String) {
        if let Some(rest) = text.strip_prefix(PERSONAL_PREFIX) {
            return match &profile.private_namespace {
                Some(ns) => (Some(vec![ns.clone()]), rest.trim().to_string()),
                None => (None, rest.trim().to_string()),
            };
        }

        let namespaces = access::accessible_namespaces(&profile.access_profile());
        (Some(namespaces), text.to_string())
    }

    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.append(&record) {
            Logger::warn("AUDIT_APPEND_FAILED", &[("error", &e.to_string())]);
        }
    }
}
