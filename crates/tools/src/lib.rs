//! Tool Runtime & Registry (spec.md §4.6): dispatches a
//! [`ToolExecutionRequest`] to its registered [`ToolHandler`], enforcing
//! mode semantics (`mock`/`dry_run`/`real`), a per-tool circuit breaker,
//! and session usage aggregation.

pub mod circuit;
pub mod error;
pub mod handler;
pub mod registry;
pub mod runtime;
pub mod types;

pub use circuit::CircuitBreaker;
pub use error::ToolError;
pub use handler::ToolHandler;
pub use registry::ToolRegistry;
pub use runtime::{CircuitBreakerConfig, ToolRuntime};
pub use types::{
    ToolExecutionRequest, ToolExecutionResult, ToolMode, ToolSchema, ToolSupports, Usage, UsageSummary,
};
