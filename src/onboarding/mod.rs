//! # Onboarding / Gating Protocol
//!
//! The conversational state machine that intercepts every inbound message
//! from an external messaging identity:
//!
//! - `Unknown` — no profile exists; messages without a code-shaped token
//!   are answered with an instructional prompt and the state does not
//!   advance (the implicit `AwaitingCode` substate)
//! - `Verifying` — the message carries a code-shaped token, which is
//!   extracted and redeemed
//! - `Authorized` — a profile exists; code handling is skipped entirely
//!   and the message is routed to query processing
//!
//! The machine is per-external-identity; the only shared state is the
//! durable code and profile stores.

pub mod profile;
pub mod protocol;

use serde::{Deserialize, Serialize};

pub use profile::{InMemoryProfileRepository, PrincipalProfile, ProfileRepository};
pub use protocol::{GateOutcome, GateProtocol, InboundMessage};

/// A quick-action suggestion attached to a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    /// Button label
    pub label: String,
    /// Message sent back when the action is tapped
    pub message: String,
}

/// Structured reply returned to the messaging platform.
///
/// Business-logic failures are delivered as ordinary replies; the webhook
/// transport always reports success for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_actions: Vec<QuickAction>,
}

impl ChatReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quick_actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, message: impl Into<String>) -> Self {
        self.quick_actions.push(QuickAction {
            label: label.into(),
            message: message.into(),
        });
        self
    }
}
