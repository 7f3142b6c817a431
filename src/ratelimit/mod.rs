//! # Rate Limiter
//!
//! Per-tier daily query quotas. Usage is computed by counting the
//! principal's logged queries within the current calendar day at check
//! time; there is no counter to maintain or to drift.
//!
//! When the count cannot be obtained the limiter **fails open**: the chat
//! surface stays available at the cost of strict quota enforcement. That
//! trade-off is deliberate; the components guarding sensitive data fail
//! closed instead (see `core::error`).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Tier;
use crate::observability::Logger;
use crate::query::log::QueryLogRepository;

/// Sentinel for an unlimited tier
pub const UNLIMITED: i64 = -1;

/// Daily quota per tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    #[serde(default = "default_free")]
    pub free: i64,
    #[serde(default = "default_basic")]
    pub basic: i64,
    #[serde(default = "default_pro")]
    pub pro: i64,
    #[serde(default = "default_enterprise")]
    pub enterprise: i64,
}

fn default_free() -> i64 {
    10
}

fn default_basic() -> i64 {
    100
}

fn default_pro() -> i64 {
    1000
}

fn default_enterprise() -> i64 {
    UNLIMITED
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            free: default_free(),
            basic: default_basic(),
            pro: default_pro(),
            enterprise: default_enterprise(),
        }
    }
}

impl RateLimitPolicy {
    /// Quota for a tier; `UNLIMITED` short-circuits the check
    pub fn limit_for(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Free => self.free,
            Tier::Basic => self.basic,
            Tier::Pro => self.pro,
            Tier::Enterprise => self.enterprise,
        }
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Remaining quota today; `UNLIMITED` for unlimited tiers
    pub remaining: i64,
    pub limit: i64,
}

/// Daily quota check over the query log
pub struct RateLimiter {
    policy: RateLimitPolicy,
    log: Arc<dyn QueryLogRepository>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, log: Arc<dyn QueryLogRepository>) -> Self {
        Self { policy, log }
    }

    /// Check a principal against its tier quota for today (UTC day).
    ///
    /// Infallible by design: a store failure is logged and the request is
    /// allowed through.
    pub fn check(&self, principal_id: Uuid, tier: Tier) -> RateLimitDecision {
        let limit = self.policy.limit_for(tier);

        if limit == UNLIMITED {
            return RateLimitDecision {
                allowed: true,
                remaining: UNLIMITED,
                limit: UNLIMITED,
            };
        }

        let today = Utc::now().date_naive();
        match self.log.count_on_day(principal_id, today) {
            Ok(count) => {
                let count = count as i64;
                RateLimitDecision {
                    allowed: count < limit,
                    remaining: (limit - count).max(0),
                    limit,
                }
            }
            Err(e) => {
                // fail open
                Logger::warn(
                    "RATE_LIMIT_CHECK_FAILED",
                    &[
                        ("principal_id", &principal_id.to_string()),
                        ("error", &e.to_string()),
                    ],
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: limit,
                    limit,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{GateError, GateResult};
    use crate::query::log::{InMemoryQueryLog, QueryLogEntry};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_limit_table() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit_for(Tier::Free), 10);
        assert_eq!(policy.limit_for(Tier::Basic), 100);
        assert_eq!(policy.limit_for(Tier::Pro), 1000);
        assert_eq!(policy.limit_for(Tier::Enterprise), UNLIMITED);
    }

    #[test]
    fn test_quota_allows_up_to_limit() {
        let log = Arc::new(InMemoryQueryLog::new());
        let limiter = RateLimiter::new(RateLimitPolicy::default(), log.clone());
        let principal = Uuid::new_v4();

        for n in 0..10 {
            let decision = limiter.check(principal, Tier::Free);
            assert!(decision.allowed, "query {} should be allowed", n + 1);
            log.append(&QueryLogEntry::new(principal, "chat-1", "q"))
                .unwrap();
        }

        // the 11th within the same day is denied
        let decision = limiter.check(principal, Tier::Free);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.limit, 10);
    }

    #[test]
    fn test_day_rollover_restores_quota() {
        let log = Arc::new(InMemoryQueryLog::new());
        let limiter = RateLimiter::new(RateLimitPolicy::default(), log.clone());
        let principal = Uuid::new_v4();

        // ten queries logged yesterday
        for _ in 0..10 {
            let mut entry = QueryLogEntry::new(principal, "chat-1", "q");
            entry.timestamp = Utc::now() - Duration::days(1);
            log.append(&entry).unwrap();
        }

        let decision = limiter.check(principal, Tier::Free);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 10);
    }

    #[test]
    fn test_unlimited_tier_short_circuits() {
        struct PanickingLog;
        impl QueryLogRepository for PanickingLog {
            fn append(&self, _: &QueryLogEntry) -> GateResult<()> {
                Ok(())
            }
            fn count_on_day(&self, _: Uuid, _: NaiveDate) -> GateResult<u64> {
                panic!("unlimited tier must not read the log");
            }
        }

        let limiter = RateLimiter::new(RateLimitPolicy::default(), Arc::new(PanickingLog));
        let decision = limiter.check(Uuid::new_v4(), Tier::Enterprise);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, UNLIMITED);
    }

    #[test]
    fn test_fails_open_when_store_unavailable() {
        struct BrokenLog;
        impl QueryLogRepository for BrokenLog {
            fn append(&self, _: &QueryLogEntry) -> GateResult<()> {
                Err(GateError::StorageError("down".to_string()))
            }
            fn count_on_day(&self, _: Uuid, _: NaiveDate) -> GateResult<u64> {
                Err(GateError::StorageError("down".to_string()))
            }
        }

        let limiter = RateLimiter::new(RateLimitPolicy::default(), Arc::new(BrokenLog));
        let decision = limiter.check(Uuid::new_v4(), Tier::Free);
        assert!(decision.allowed);
        assert_eq!(decision.limit, 10);
    }
}
