//! `ToolRuntime`: dispatches a [`ToolExecutionRequest`] to its registered
//! handler, enforcing mode semantics, the per-tool circuit breaker, and
//! usage aggregation (spec.md §4.6).

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use fulcrum_common::SessionId;
use fulcrum_journal::Journal;
use fulcrum_permission::PolicyProfile;
use parking_lot::Mutex;
use serde_json::json;

use crate::circuit::CircuitBreaker;
use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::types::{ToolExecutionRequest, ToolExecutionResult, ToolMode, UsageSummary};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

pub struct ToolRuntime {
    registry: Arc<ToolRegistry>,
    journal: Arc<dyn Journal>,
    breakers: DashMap<String, Mutex<CircuitBreaker>>,
    breaker_config: CircuitBreakerConfig,
    usage: DashMap<SessionId, UsageSummary>,
}

impl ToolRuntime {
    pub fn new(registry: Arc<ToolRegistry>, journal: Arc<dyn Journal>, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            registry,
            journal,
            breakers: DashMap::new(),
            breaker_config,
            usage: DashMap::new(),
        }
    }

    pub fn usage_for(&self, session_id: SessionId) -> UsageSummary {
        self.usage.get(&session_id).map(|u| u.value().clone()).unwrap_or_default()
    }

    pub fn clear_session_usage(&self, session_id: SessionId) {
        self.usage.remove(&session_id);
    }

    /// All registered tool schemas, for the kernel's critics and planner
    /// context (spec.md §6).
    pub fn registry_schemas(&self) -> Vec<crate::types::ToolSchema> {
        self.registry.schemas()
    }

    pub async fn dispatch(
        &self,
        request: ToolExecutionRequest,
        policy: &PolicyProfile,
    ) -> Result<ToolExecutionResult, ToolError> {
        let Some(handler) = self.registry.get(&request.tool_name) else {
            return Err(ToolError::ToolNotFound(request.tool_name));
        };
        let schema = handler.schema();

        match request.mode {
            ToolMode::Mock if !schema.supports.mock => {
                return Err(ToolError::InvalidInput(format!(
                    "tool `{}` does not support mock mode",
                    request.tool_name
                )))
            }
            ToolMode::DryRun if !schema.supports.dry_run => {
                return Err(ToolError::InvalidInput(format!(
                    "tool `{}` does not support dry_run mode",
                    request.tool_name
                )))
            }
            _ => {}
        }

        {
            let breaker = self
                .breakers
                .entry(request.tool_name.clone())
                .or_insert_with(|| Mutex::new(CircuitBreaker::new(self.breaker_config.failure_threshold, self.breaker_config.cooldown)));
            let mut breaker = breaker.lock();
            if !breaker.allow_call() {
                return Err(ToolError::CircuitBreakerOpen(request.tool_name));
            }
        }

        self.journal
            .emit(
                request.session_id,
                "tool.requested",
                json!({ "tool": request.tool_name, "mode": request.mode, "request_id": request.request_id }),
            )
            .await?;
        self.journal
            .emit(request.session_id, "tool.started", json!({ "tool": request.tool_name }))
            .await?;

        let started_at = Instant::now();
        let call_future = handler.handle(request.input.clone(), request.mode, policy);
        let outcome = match request.timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), call_future).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout(request.tool_name.clone(), ms)),
            },
            None => call_future.await,
        };
        let duration_ms = started_at.elapsed().as_millis() as u64;

        self.record_outcome(&request.tool_name, outcome.is_ok());

        match outcome {
            Ok(output) => {
                let usage = extract_usage(&output);
                self.usage.entry(request.session_id).or_default().add(&usage);

                self.journal
                    .emit(
                        request.session_id,
                        "tool.succeeded",
                        json!({ "tool": request.tool_name, "duration_ms": duration_ms }),
                    )
                    .await?;

                Ok(ToolExecutionResult {
                    output,
                    usage,
                    duration_ms,
                })
            }
            Err(err) => {
                if let ToolError::Policy(policy_err) = &err {
                    self.journal
                        .emit(
                            request.session_id,
                            "policy.violated",
                            json!({ "tool": request.tool_name, "rule": policy_err.to_string() }),
                        )
                        .await?;
                }
                self.journal
                    .emit(
                        request.session_id,
                        "tool.failed",
                        json!({ "tool": request.tool_name, "error": err.to_string(), "duration_ms": duration_ms }),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    fn record_outcome(&self, tool_name: &str, succeeded: bool) {
        if let Some(breaker) = self.breakers.get(tool_name) {
            let mut breaker = breaker.lock();
            if succeeded {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
        }
    }
}

/// Tool handlers that report cost/usage do so via a `_usage` field on
/// their output (`{tokens?, cost_usd?}`); absent means untracked.
fn extract_usage(output: &serde_json::Value) -> crate::types::Usage {
    output
        .get("_usage")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ToolHandler;
    use crate::types::{ToolSchema, ToolSupports};
    use async_trait::async_trait;
    use fulcrum_journal::FileJournal;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTool {
        fail_calls: AtomicU32,
    }

    #[async_trait]
    impl ToolHandler for FlakyTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "flaky".to_string(),
                version: "1.0.0".to_string(),
                input_schema: Value::Null,
                supports: ToolSupports { mock: true, dry_run: false },
                mock_responses: None,
            }
        }

        async fn handle(&self, _input: Value, mode: ToolMode, _policy: &PolicyProfile) -> Result<Value, ToolError> {
            if mode == ToolMode::Mock {
                return Ok(json!({ "ok": true }));
            }
            if self.fail_calls.load(Ordering::SeqCst) > 0 {
                self.fail_calls.fetch_sub(1, Ordering::SeqCst);
                return Err(ToolError::Handler("boom".to_string()));
            }
            Ok(json!({ "ok": true, "_usage": { "tokens": 10, "cost_usd": 0.01 } }))
        }
    }

    fn runtime(dir: &tempfile::TempDir, fail_calls: u32) -> ToolRuntime {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(FlakyTool { fail_calls: AtomicU32::new(fail_calls) }));
        let journal: Arc<dyn Journal> = Arc::new(FileJournal::open(dir.path().join("j.ndjson")).unwrap());
        ToolRuntime::new(registry, journal, CircuitBreakerConfig { failure_threshold: 2, cooldown: Duration::from_secs(60) })
    }

    fn request(mode: ToolMode) -> ToolExecutionRequest {
        ToolExecutionRequest {
            request_id: fulcrum_common::RequestId::new(),
            tool_name: "flaky".to_string(),
            tool_version: None,
            input: Value::Null,
            mode,
            session_id: SessionId::new(),
            step_id: None,
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn mock_mode_rejected_when_unsupported_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(&dir, 0);
        let err = rt.dispatch(request(ToolMode::DryRun), &PolicyProfile::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn successful_call_aggregates_usage() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(&dir, 0);
        let session = request(ToolMode::Real).session_id;
        let mut req = request(ToolMode::Real);
        req.session_id = session;
        let result = rt.dispatch(req, &PolicyProfile::default()).await.unwrap();
        assert_eq!(result.usage.tokens, Some(10));
        assert_eq!(rt.usage_for(session).call_count, 1);
        assert_eq!(rt.usage_for(session).tokens_used, 10);
    }

    #[tokio::test]
    async fn breaker_opens_after_consecutive_failures() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(&dir, 5);
        let session = SessionId::new();
        let mut req1 = request(ToolMode::Real);
        req1.session_id = session;
        let mut req2 = request(ToolMode::Real);
        req2.session_id = session;
        let mut req3 = request(ToolMode::Real);
        req3.session_id = session;

        assert!(rt.dispatch(req1, &PolicyProfile::default()).await.is_err());
        assert!(rt.dispatch(req2, &PolicyProfile::default()).await.is_err());
        let err = rt.dispatch(req3, &PolicyProfile::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::CircuitBreakerOpen(_)));
    }
}
