//! codegate - verification-code gated access control engine
//!
//! Single-use verification codes bind an anonymous messaging identity to a
//! role/tier access profile; every subsequent query is authorized,
//! rate-limited, and namespace-scoped.

pub mod access;
pub mod cli;
pub mod core;
pub mod credential;
pub mod http_server;
pub mod observability;
pub mod onboarding;
pub mod query;
pub mod ratelimit;
pub mod verification;
