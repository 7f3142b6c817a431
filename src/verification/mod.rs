//! # Verification Code Lifecycle
//!
//! Generation, persistence, and atomic state transitions for single- and
//! multi-use verification codes: `active → used` when the final use is
//! consumed, `active → expired` lazily at redemption time, and
//! `active → disabled` administratively. `used`, `expired`, and `disabled`
//! are terminal.

pub mod code;
pub mod generate;
pub mod service;
pub mod store;

pub use code::{CodeStatus, MatchField, VerificationCode};
pub use generate::{normalize, CODE_ALPHABET};
pub use service::{
    BulkIssueRequest, BulkIssueRow, IssueRequest, IssuedCode, Redemption, RedemptionRequest,
    VerificationService,
};
pub use store::{CodeRepository, InMemoryCodeRepository, RedeemWrite};
