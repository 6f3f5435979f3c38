//! Webhook half of the dual-channel relay: delivers a signed prompt to a
//! remote endpoint over HTTP and waits on a pending-prompt registry that an
//! inbound signed callback resolves (spec.md §6).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use dashmap::DashMap;
use fulcrum_permission::{ApprovalChannel, ApprovalDecision, ApprovalPromptRequest, PermissionError};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::RelayError;
use crate::signature;
use crate::types::{InboundDecision, OutboundPrompt, WebhookRelayConfig, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Relays approval prompts to a remote webhook endpoint and serves the
/// inbound decision callback route.
pub struct WebhookApprovalChannel {
    config: WebhookRelayConfig,
    http: reqwest::Client,
    pending: Arc<DashMap<String, oneshot::Sender<ApprovalDecision>>>,
}

impl WebhookApprovalChannel {
    pub fn new(config: WebhookRelayConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            http: reqwest::Client::new(),
            pending: Arc::new(DashMap::new()),
        })
    }

    /// The axum router serving the inbound decision callback. Mounted by the
    /// runtime composition root alongside whatever other HTTP surface it
    /// exposes.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/decisions/:request_id", post(handle_decision))
            .with_state(self.clone())
    }

    fn resolve(&self, request_id: &str, decision: ApprovalDecision) -> Result<(), RelayError> {
        let (_, sender) = self
            .pending
            .remove(request_id)
            .ok_or_else(|| RelayError::NoPendingPrompt(request_id.to_string()))?;
        let _ = sender.send(decision);
        Ok(())
    }
}

async fn handle_decision(
    State(relay): State<Arc<WebhookApprovalChannel>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(sig) => sig,
        None => return (StatusCode::UNAUTHORIZED, "missing signature").into_response(),
    };
    let timestamp: i64 = match headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
    {
        Some(ts) => ts,
        None => return (StatusCode::UNAUTHORIZED, "missing timestamp").into_response(),
    };

    if signature::verify(&relay.config.signing_secret, timestamp, &body, signature).is_err() {
        return (StatusCode::UNAUTHORIZED, "signature invalid").into_response();
    }

    let inbound: InboundDecision = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    match relay.resolve(&inbound.request_id, inbound.decision) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(RelayError::NoPendingPrompt(id)) => {
            (StatusCode::NOT_FOUND, format!("no pending prompt {id}")).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[async_trait]
impl ApprovalChannel for WebhookApprovalChannel {
    async fn prompt(&self, request: ApprovalPromptRequest) -> Result<ApprovalDecision, PermissionError> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let outbound = OutboundPrompt::new(request_id.clone(), &request);
        let body = serde_json::to_vec(&outbound)
            .map_err(|err| PermissionError::PromptFailed(format!("encoding prompt: {err}")))?;
        let timestamp = chrono::Utc::now().timestamp();
        let signature = signature::sign(&self.config.signing_secret, timestamp, &body);

        let send_result = self
            .http
            .post(&self.config.delivery_url)
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await;

        if let Err(err) = send_result {
            self.pending.remove(&request_id);
            return Err(RelayError::Delivery(err).into());
        }

        match tokio::time::timeout(Duration::from_millis(self.config.prompt_timeout_ms), rx).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(_)) => {
                self.pending.remove(&request_id);
                Err(RelayError::NoPendingPrompt(request_id).into())
            }
            Err(_) => {
                self.pending.remove(&request_id);
                Err(RelayError::Timeout(self.config.prompt_timeout_ms).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_common::SessionId;
    use fulcrum_permission::LegacyDecision;

    fn test_config(delivery_url: String) -> WebhookRelayConfig {
        WebhookRelayConfig {
            delivery_url,
            signing_secret: "secret".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            prompt_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn times_out_when_nobody_resolves_the_prompt() {
        let relay = WebhookApprovalChannel::new(WebhookRelayConfig {
            prompt_timeout_ms: 50,
            ..test_config("http://127.0.0.1:1/unreachable".to_string())
        });
        let request = ApprovalPromptRequest {
            session_id: SessionId::new(),
            tool_name: "fs_write".to_string(),
            missing_scopes: vec!["fs:write:/tmp".to_string()],
        };
        let err = relay.prompt(request).await.unwrap_err();
        assert!(matches!(err, PermissionError::PromptFailed(_)));
    }

    #[test]
    fn resolve_rejects_unknown_request_id() {
        let relay = WebhookApprovalChannel::new(test_config("http://example.invalid".to_string()));
        let err = relay
            .resolve("does-not-exist", ApprovalDecision::Legacy(LegacyDecision::AllowOnce))
            .unwrap_err();
        assert!(matches!(err, RelayError::NoPendingPrompt(_)));
    }
}
