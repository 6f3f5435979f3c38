//! Tool request/result shapes (spec.md §4.6, §6).

use fulcrum_common::{RequestId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    Mock,
    DryRun,
    Real,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionRequest {
    pub request_id: RequestId,
    pub tool_name: String,
    pub tool_version: Option<String>,
    pub input: Value,
    pub mode: ToolMode,
    pub session_id: SessionId,
    pub step_id: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub tokens: Option<u64>,
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub output: Value,
    pub usage: Usage,
    pub duration_ms: u64,
}

/// What mode(s) a handler is willing to run in (spec.md §4.6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToolSupports {
    pub mock: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub version: String,
    pub input_schema: Value,
    pub supports: ToolSupports,
    pub mock_responses: Option<Value>,
}

/// Running totals for one session, surfaced to the futility monitor and
/// the kernel's budget checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub tokens_used: u64,
    pub total_cost_usd: f64,
    pub call_count: u64,
}

impl UsageSummary {
    pub fn add(&mut self, usage: &Usage) {
        self.tokens_used += usage.tokens.unwrap_or(0);
        self.total_cost_usd += usage.cost_usd.unwrap_or(0.0);
        self.call_count += 1;
    }
}
