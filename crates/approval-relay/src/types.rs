//! Wire shapes for the webhook half of the relay: the outbound prompt
//! delivery payload and the inbound decision callback payload, each
//! accompanied by an HMAC signature header (spec.md §6, §9).

use fulcrum_common::SessionId;
use fulcrum_permission::{ApprovalDecision, ApprovalPromptRequest};
use serde::{Deserialize, Serialize};

/// Static configuration for the webhook relay, loaded the way every other
/// `fulcrum-*` crate loads config: a struct deserialized from TOML with
/// environment overrides applied by the runtime composition root.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRelayConfig {
    /// Endpoint the relay POSTs signed prompts to.
    pub delivery_url: String,
    /// Shared secret used for both outbound signing and inbound verification.
    pub signing_secret: String,
    /// Bind address for the inbound decision callback server.
    pub listen_addr: String,
    /// Milliseconds to wait for a decision before the prompt times out.
    #[serde(default = "default_prompt_timeout_ms")]
    pub prompt_timeout_ms: u64,
}

fn default_prompt_timeout_ms() -> u64 {
    120_000
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundPrompt {
    pub request_id: String,
    pub session_id: SessionId,
    pub tool_name: String,
    pub missing_scopes: Vec<String>,
}

impl OutboundPrompt {
    pub fn new(request_id: String, request: &ApprovalPromptRequest) -> Self {
        Self {
            request_id,
            session_id: request.session_id,
            tool_name: request.tool_name.clone(),
            missing_scopes: request.missing_scopes.clone(),
        }
    }
}

/// The body of an inbound `POST /decisions/:request_id` callback. Wraps
/// [`ApprovalDecision`]'s untagged legacy/structured shapes under a named
/// field so the envelope itself stays self-describing.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundDecision {
    pub request_id: String,
    pub decision: ApprovalDecision,
}

pub const SIGNATURE_HEADER: &str = "x-fulcrum-signature";
pub const TIMESTAMP_HEADER: &str = "x-fulcrum-timestamp";
