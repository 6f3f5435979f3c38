//! Dual-channel (CLI + webhook) human approval prompt relay implementing
//! `fulcrum_permission::ApprovalChannel` (spec.md §6, §9).

pub mod cli;
pub mod error;
pub mod relay;
pub mod signature;
pub mod types;
pub mod webhook;

pub use cli::{CliApprovalChannel, CliPromptReceiver, PendingPrompt};
pub use error::RelayError;
pub use relay::RelayApprovalChannel;
pub use types::{InboundDecision, OutboundPrompt, WebhookRelayConfig};
pub use webhook::WebhookApprovalChannel;
