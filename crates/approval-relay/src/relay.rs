//! Combines the CLI and webhook channels into a single [`ApprovalChannel`]:
//! whichever responds first wins, the other's answer (if it ever arrives) is
//! discarded. Mirrors spec.md §6's requirement that an approval prompt is
//! satisfied by the first channel a human actually has open.

use std::sync::Arc;

use async_trait::async_trait;
use fulcrum_permission::{ApprovalChannel, ApprovalDecision, ApprovalPromptRequest, PermissionError};

/// Races an arbitrary set of channels and returns the first decision. With
/// zero channels configured, every prompt fails immediately rather than
/// hanging forever.
pub struct RelayApprovalChannel {
    channels: Vec<Arc<dyn ApprovalChannel>>,
}

impl RelayApprovalChannel {
    pub fn new(channels: Vec<Arc<dyn ApprovalChannel>>) -> Arc<Self> {
        Arc::new(Self { channels })
    }
}

#[async_trait]
impl ApprovalChannel for RelayApprovalChannel {
    async fn prompt(&self, request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
        if self.channels.is_empty() {
            return Err(PermissionError::PromptFailed(
                "no approval channels configured".to_string(),
            ));
        }

        let futures = self.channels.iter().map(|channel| {
            let channel = channel.clone();
            let request = request.clone();
            Box::pin(async move { channel.prompt(request).await })
        });

        let (result, _, _) = futures::future::select_all(futures).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_common::SessionId;
    use fulcrum_permission::LegacyDecision;
    use std::time::Duration;

    struct SlowDeny;
    #[async_trait]
    impl ApprovalChannel for SlowDeny {
        async fn prompt(&self, _request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(ApprovalDecision::Legacy(LegacyDecision::Deny))
        }
    }

    struct FastAllow;
    #[async_trait]
    impl ApprovalChannel for FastAllow {
        async fn prompt(&self, _request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
            Ok(ApprovalDecision::Legacy(LegacyDecision::AllowOnce))
        }
    }

    #[tokio::test]
    async fn first_channel_to_answer_wins() {
        let relay = RelayApprovalChannel::new(vec![Arc::new(SlowDeny), Arc::new(FastAllow)]);
        let request = ApprovalPromptRequest {
            session_id: SessionId::new(),
            tool_name: "fs_write".to_string(),
            missing_scopes: vec!["fs:write:/tmp".to_string()],
        };
        let decision = relay.prompt(request).await.unwrap();
        assert!(matches!(decision, ApprovalDecision::Legacy(LegacyDecision::AllowOnce)));
    }

    #[tokio::test]
    async fn no_channels_fails_fast() {
        let relay = RelayApprovalChannel::new(vec![]);
        let request = ApprovalPromptRequest {
            session_id: SessionId::new(),
            tool_name: "fs_write".to_string(),
            missing_scopes: vec![],
        };
        assert!(relay.prompt(request).await.is_err());
    }
}
