//! `TaskRuntime`: the composition root (spec.md §1 OVERVIEW, §6 EXTERNAL
//! INTERFACES). Wires the journal, permission engine, tool runtime, kernel,
//! scheduler and (optionally) the swarm delegation core into one object,
//! the way the teacher's `runtime/src/lib.rs` builds `AgentRuntime` by
//! constructing each subsystem from `RuntimeConfig`'s sub-configs and
//! storing them behind `Arc`.

use std::sync::Arc;

use async_trait::async_trait;
use fulcrum_common::SessionId;
use fulcrum_journal::{FileJournal, Journal};
use fulcrum_kernel::{Critic, Kernel, KernelConfig, Limits, Planner, SessionMode, SessionStatus};
use fulcrum_permission::{ApprovalChannel, DefaultPermissionEngine, PolicyProfile};
use fulcrum_scheduler::{SchedulerConfig, SchedulerEngine, SessionFactory};
use fulcrum_swarm::{PeerIdentity, SwarmState};
use fulcrum_tools::{ToolHandler, ToolRegistry, ToolRuntime};

use crate::audit::{AuditHook, TracingAuditHook};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;

/// Bridges the scheduler's `createSession` jobs (spec.md §4.8) to the
/// kernel: creates the session then immediately spawns `Kernel::run` so a
/// fired schedule actually drives to completion rather than sitting in
/// `created`.
struct KernelSessionFactory {
    kernel: Arc<Kernel>,
}

#[async_trait]
impl SessionFactory for KernelSessionFactory {
    async fn create_session(
        &self,
        task_text: String,
        mode: Option<String>,
        constraints: Option<serde_json::Value>,
        _agentic: Option<bool>,
    ) -> Result<SessionId, fulcrum_scheduler::SchedulerError> {
        let mode = match mode.as_deref() {
            Some("dry_run") => SessionMode::DryRun,
            Some("mock") => SessionMode::Mock,
            _ => SessionMode::Real,
        };
        let limits = constraints
            .and_then(|c| serde_json::from_value::<Limits>(c).ok())
            .unwrap_or_default();
        let kernel = self.kernel.clone();
        let session_id = kernel
            .create_session(task_text, mode, limits, PolicyProfile::default())
            .await
            .map_err(|err| fulcrum_scheduler::SchedulerError::JobFailed(err.to_string()))?;
        tokio::spawn(async move {
            if let Err(err) = kernel.run(session_id).await {
                tracing::warn!(%session_id, error = %err, "scheduled session run failed");
            }
        });
        Ok(session_id)
    }
}

pub struct TaskRuntime {
    pub config: RuntimeConfig,
    pub journal: Arc<dyn Journal>,
    pub permission: Arc<DefaultPermissionEngine>,
    pub tools: Arc<ToolRuntime>,
    pub kernel: Arc<Kernel>,
    pub scheduler: Arc<SchedulerEngine>,
    pub swarm: Option<Arc<SwarmState>>,
    pub audit: Arc<dyn AuditHook>,
}

impl TaskRuntime {
    /// Builds every subsystem from `config`, consuming the host-provided
    /// external collaborators named in spec.md §6: the planner, the tool
    /// handlers to register, and the approval channel the permission engine
    /// prompts through.
    pub fn new(
        config: RuntimeConfig,
        planner: Arc<dyn Planner>,
        approval: Arc<dyn ApprovalChannel>,
        tool_handlers: Vec<Arc<dyn ToolHandler>>,
        critics: Vec<Box<dyn Critic>>,
        audit: Option<Arc<dyn AuditHook>>,
    ) -> Result<Self, RuntimeError> {
        std::fs::create_dir_all(&config.storage.data_dir)?;

        let journal: Arc<dyn Journal> = Arc::new(FileJournal::open(config.journal_path())?);

        let permission = Arc::new(DefaultPermissionEngine::new(
            journal.clone(),
            approval,
            config.permission_signing_secret(),
        ));

        let registry = Arc::new(ToolRegistry::new());
        for handler in tool_handlers {
            registry.register(handler);
        }
        let tools = Arc::new(ToolRuntime::new(registry, journal.clone(), Default::default()));

        let kernel = Arc::new(Kernel::new(
            journal.clone(),
            permission.clone(),
            tools.clone(),
            planner,
            critics,
            KernelConfig::default(),
        ));

        let store = fulcrum_scheduler::ScheduleStore::new(config.schedule_store_path());
        let session_factory: Arc<dyn SessionFactory> = Arc::new(KernelSessionFactory { kernel: kernel.clone() });
        let scheduler = Arc::new(SchedulerEngine::new(
            store,
            journal.clone(),
            session_factory,
            SchedulerConfig { tick_interval: std::time::Duration::from_millis(config.scheduler.tick_interval_ms) },
        )?);

        let swarm = if config.swarm.enabled {
            let self_identity = PeerIdentity {
                node_id: fulcrum_common::PeerId::new(),
                display_name: config.swarm.display_name.clone(),
                api_url: config.swarm.api_url.clone(),
                capabilities: vec![],
                version: env!("CARGO_PKG_VERSION").to_string(),
                credentials: None,
            };
            Some(Arc::new(SwarmState::new(
                self_identity,
                config.permission_signing_secret(),
                journal.clone(),
                config.escrow_path(),
            )?))
        } else {
            None
        };

        Ok(Self {
            config,
            journal,
            permission,
            tools,
            kernel,
            scheduler,
            swarm,
            audit: audit.unwrap_or_else(|| Arc::new(TracingAuditHook)),
        })
    }

    /// Spawns the scheduler's tick loop in the background. Mirrors the
    /// teacher's `DefaultAgentScheduler::start()` fire-and-forget pattern.
    pub fn spawn_scheduler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let interval = std::time::Duration::from_millis(self.config.scheduler.tick_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = scheduler.tick().await {
                    tracing::warn!(error = %err, "scheduler tick failed");
                }
            }
        })
    }

    pub async fn create_session(
        &self,
        task: String,
        mode: SessionMode,
        limits: Limits,
        policy: PolicyProfile,
    ) -> Result<SessionId, RuntimeError> {
        Ok(self.kernel.create_session(task, mode, limits, policy).await?)
    }

    pub async fn run_session(&self, session_id: SessionId) -> Result<SessionStatus, RuntimeError> {
        Ok(self.kernel.run(session_id).await?)
    }
}
