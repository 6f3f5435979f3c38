//! The `ToolHandler` interface (spec.md §6: "a function `handle(input,
//! mode, policy) -> output | raises`"). Mirrors the shape of the teacher's
//! `ToolInvocationEnforcer` trait in
//! `runtime/src/integrations/tool_invocation.rs`, narrowed to the single
//! `handle` entry point this spec names plus a `schema()` accessor the
//! registry and critics both need.

use async_trait::async_trait;
use fulcrum_permission::PolicyProfile;
use serde_json::Value;

use crate::error::ToolError;
use crate::types::{ToolMode, ToolSchema};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Must honor mode semantics: `mock` returns deterministic output with
    /// no I/O side effects, `dry_run` validates and previews without
    /// persisting, `real` executes fully.
    async fn handle(&self, input: Value, mode: ToolMode, policy: &PolicyProfile) -> Result<Value, ToolError>;
}
