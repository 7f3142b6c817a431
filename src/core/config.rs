//! # Gate Configuration
//!
//! One injected configuration object for the whole engine. Defaults that
//! used to be scattered across call sites (default role and tier for issued
//! codes, expiry horizon, quota table, code shape) live here and nowhere
//! else.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::access::{Role, Tier};
use crate::core::error::{GateError, GateResult};
use crate::http_server::HttpServerConfig;
use crate::ratelimit::RateLimitPolicy;

/// Defaults applied to issued codes when a request leaves them unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDefaults {
    /// Role granted on redemption
    #[serde(default = "default_role")]
    pub role: Role,

    /// Subscription tier granted on redemption
    #[serde(default = "default_tier")]
    pub tier: Tier,

    /// Expiry horizon in days; `None` means issued codes never expire
    #[serde(default = "default_expiry_days")]
    pub expiry_days: Option<u32>,

    /// Redemptions allowed per code
    #[serde(default = "default_max_uses")]
    pub max_uses: u32,
}

fn default_role() -> Role {
    Role::User
}

fn default_tier() -> Tier {
    Tier::Free
}

fn default_expiry_days() -> Option<u32> {
    Some(30)
}

fn default_max_uses() -> u32 {
    1
}

impl Default for CodeDefaults {
    fn default() -> Self {
        Self {
            role: default_role(),
            tier: default_tier(),
            expiry_days: default_expiry_days(),
            max_uses: default_max_uses(),
        }
    }
}

/// Shape of generated code tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeShape {
    /// Number of dash-separated groups
    #[serde(default = "default_groups")]
    pub groups: usize,

    /// Characters per group
    #[serde(default = "default_group_len")]
    pub group_len: usize,

    /// Regeneration attempts before issuance fails hard
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_groups() -> usize {
    4
}

fn default_group_len() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    16
}

impl Default for CodeShape {
    fn default() -> Self {
        Self {
            groups: default_groups(),
            group_len: default_group_len(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Query dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Deadline for the user-visible answer path, in milliseconds.
    /// Must stay below the messaging platform's own response ceiling.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Passages requested from the knowledge store per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_timeout_ms() -> u64 {
    4500
}

fn default_top_k() -> usize {
    5
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            top_k: default_top_k(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Defaults for issued codes
    #[serde(default)]
    pub defaults: CodeDefaults,

    /// Code token shape
    #[serde(default)]
    pub code_shape: CodeShape,

    /// Bulk issuance ceiling
    #[serde(default = "default_batch_ceiling")]
    pub batch_ceiling: usize,

    /// Per-tier daily quotas
    #[serde(default)]
    pub rate_limits: RateLimitPolicy,

    /// Query dispatch settings
    #[serde(default)]
    pub query: QueryConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: HttpServerConfig,

    /// SHA-256 hash (base64, url-safe) of the admin bearer token.
    /// `None` disables the admin surface entirely.
    #[serde(default)]
    pub admin_token_hash: Option<String>,

    /// Audit log file path; `None` keeps the audit log in memory
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

fn default_batch_ceiling() -> usize {
    100
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            defaults: CodeDefaults::default(),
            code_shape: CodeShape::default(),
            batch_ceiling: default_batch_ceiling(),
            rate_limits: RateLimitPolicy::default(),
            query: QueryConfig::default(),
            server: HttpServerConfig::default(),
            admin_token_hash: None,
            audit_log_path: None,
        }
    }
}

impl GateConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> GateResult<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| GateError::InvalidInput(format!("cannot read config: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| GateError::InvalidInput(format!("cannot parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.defaults.role, Role::User);
        assert_eq!(config.defaults.tier, Tier::Free);
        assert_eq!(config.defaults.max_uses, 1);
        assert_eq!(config.defaults.expiry_days, Some(30));
        assert_eq!(config.batch_ceiling, 100);
        assert_eq!(config.code_shape.groups, 4);
        assert_eq!(config.code_shape.group_len, 3);
        assert!(config.admin_token_hash.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: GateConfig =
            serde_json::from_str(r#"{"batch_ceiling": 10, "query": {"timeout_ms": 2000}}"#)
                .unwrap();
        assert_eq!(config.batch_ceiling, 10);
        assert_eq!(config.query.timeout_ms, 2000);
        // untouched sections keep their defaults
        assert_eq!(config.query.top_k, 5);
        assert_eq!(config.defaults.max_uses, 1);
    }

    #[test]
    fn test_round_trip() {
        let config = GateConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_ceiling, config.batch_ceiling);
        assert_eq!(back.query.timeout_ms, config.query.timeout_ms);
    }
}
