//! CLI half of the dual-channel relay: surfaces a prompt to a local
//! terminal frontend via an mpsc queue rather than reading stdin directly
//! here, so the binary crate (or a test) owns the actual I/O.

use std::sync::Arc;

use async_trait::async_trait;
use fulcrum_permission::{ApprovalChannel, ApprovalDecision, ApprovalPromptRequest, PermissionError};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// One prompt waiting for a human to answer it at the terminal.
pub struct PendingPrompt {
    pub id: Uuid,
    pub request: ApprovalPromptRequest,
    reply: oneshot::Sender<ApprovalDecision>,
}

impl PendingPrompt {
    pub fn respond(self, decision: ApprovalDecision) {
        let _ = self.reply.send(decision);
    }
}

/// Implements [`ApprovalChannel`] by forwarding every prompt to an mpsc
/// queue a CLI frontend drains with `recv()`, then waiting on a oneshot
/// the frontend resolves via [`PendingPrompt::respond`].
pub struct CliApprovalChannel {
    sink: mpsc::Sender<PendingPrompt>,
}

pub struct CliPromptReceiver {
    pub inner: mpsc::Receiver<PendingPrompt>,
}

impl CliApprovalChannel {
    /// Returns the channel plus the receiving half a CLI loop polls.
    pub fn new(buffer: usize) -> (Arc<Self>, CliPromptReceiver) {
        let (sink, inner) = mpsc::channel(buffer);
        (Arc::new(Self { sink }), CliPromptReceiver { inner })
    }
}

#[async_trait]
impl ApprovalChannel for CliApprovalChannel {
    async fn prompt(&self, request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
        let (reply, rx) = oneshot::channel();
        let pending = PendingPrompt { id: Uuid::new_v4(), request, reply };
        self.sink
            .send(pending)
            .await
            .map_err(|_| PermissionError::PromptFailed("no CLI frontend attached to the prompt queue".to_string()))?;
        rx.await
            .map_err(|_| PermissionError::PromptFailed("CLI frontend dropped the prompt without responding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_common::SessionId;
    use fulcrum_permission::LegacyDecision;

    #[tokio::test]
    async fn prompt_round_trips_through_the_queue() {
        let (channel, mut receiver) = CliApprovalChannel::new(4);

        let request = ApprovalPromptRequest {
            session_id: SessionId::new(),
            tool_name: "fs_write".to_string(),
            missing_scopes: vec!["fs:write:/tmp".to_string()],
        };

        let responder = tokio::spawn(async move {
            let pending = receiver.inner.recv().await.unwrap();
            pending.respond(ApprovalDecision::Legacy(LegacyDecision::AllowOnce));
        });

        let decision = channel.prompt(request).await.unwrap();
        responder.await.unwrap();
        assert!(matches!(decision, ApprovalDecision::Legacy(LegacyDecision::AllowOnce)));
    }

    #[tokio::test]
    async fn dropped_frontend_surfaces_as_prompt_failed() {
        let (channel, receiver) = CliApprovalChannel::new(4);
        drop(receiver);

        let request = ApprovalPromptRequest {
            session_id: SessionId::new(),
            tool_name: "fs_write".to_string(),
            missing_scopes: vec!["fs:write:/tmp".to_string()],
        };
        let err = channel.prompt(request).await.unwrap_err();
        assert!(matches!(err, PermissionError::PromptFailed(_)));
    }
}
