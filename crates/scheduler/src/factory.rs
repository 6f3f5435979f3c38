//! Host-provided session creation, invoked by `createSession` jobs
//! (spec.md §4.8). The runtime crate supplies the real implementation that
//! wires through the kernel; tests use a stub.

use async_trait::async_trait;
use fulcrum_common::SessionId;
use serde_json::Value;

use crate::error::SchedulerError;

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(
        &self,
        task_text: String,
        mode: Option<String>,
        constraints: Option<Value>,
        agentic: Option<bool>,
    ) -> Result<SessionId, SchedulerError>;
}
