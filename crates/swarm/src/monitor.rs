//! Task monitor (spec.md §4.11, originator side): polls
//! `/plugins/swarm/task/:id/status` on an interval, tracks consecutive
//! missed checkpoints, and raises `onCheckpointsMissed` for the
//! optimization loop and redelegation monitor to react to.

use std::collections::HashMap;
use std::time::Duration;

use fulcrum_common::{PeerId, TaskId};
use serde::{Deserialize, Serialize};

use crate::error::SwarmError;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckpointStatus {
    pub state: CheckpointState,
    pub progress_pct: Option<f64>,
}

#[derive(Debug, Default)]
struct MonitoredTask {
    missed_checkpoints: u32,
}

pub struct TaskMonitorConfig {
    pub poll_interval: Duration,
    pub max_missed_checkpoints: u32,
}

impl Default for TaskMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_missed_checkpoints: 3,
        }
    }
}

/// Callback invoked when a task crosses `max_missed_checkpoints`
/// consecutive poll failures, naming the task and the peer responsible.
pub trait CheckpointsMissedHandler: Send + Sync {
    fn on_checkpoints_missed(&self, task_id: TaskId, peer_node_id: PeerId);
}

pub struct TaskMonitor {
    config: TaskMonitorConfig,
    tasks: HashMap<TaskId, (PeerId, MonitoredTask)>,
}

impl TaskMonitor {
    pub fn new(config: TaskMonitorConfig) -> Self {
        Self { config, tasks: HashMap::new() }
    }

    pub fn track(&mut self, task_id: TaskId, peer_node_id: PeerId) {
        self.tasks.insert(task_id, (peer_node_id, MonitoredTask::default()));
    }

    pub fn stop_tracking(&mut self, task_id: TaskId) {
        self.tasks.remove(&task_id);
    }

    pub fn is_tracking(&self, task_id: TaskId) -> bool {
        self.tasks.contains_key(&task_id)
    }

    /// Poll one task's status over `transport`. Returns the fetched status
    /// on success, resets the missed-checkpoint streak, and stops tracking
    /// once the task reaches a terminal state. On transport failure (or an
    /// explicit `checkpoint:missed` outcome the caller already observed)
    /// the streak increments and, past the threshold, `handler` fires.
    pub async fn poll(
        &mut self,
        transport: &Transport,
        task_id: TaskId,
        base_url: &str,
        handler: &dyn CheckpointsMissedHandler,
    ) -> Result<Option<CheckpointStatus>, SwarmError> {
        let Some((peer_node_id, monitored)) = self.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        let peer_node_id = *peer_node_id;

        let path = format!("plugins/swarm/task/{task_id}/status");
        match transport.get::<CheckpointStatus>(base_url, &path).await {
            Ok(status) => {
                monitored.missed_checkpoints = 0;
                if matches!(status.state, CheckpointState::Completed | CheckpointState::Failed) {
                    self.tasks.remove(&task_id);
                }
                Ok(Some(status))
            }
            Err(err) => {
                monitored.missed_checkpoints += 1;
                let missed = monitored.missed_checkpoints;
                if missed >= self.config.max_missed_checkpoints {
                    handler.on_checkpoints_missed(task_id, peer_node_id);
                }
                Err(err)
            }
        }
    }

    /// Explicit `checkpoint:missed` outcome reported out-of-band (e.g. a
    /// webhook callback rather than a poll), counted the same way a failed
    /// poll is.
    pub fn record_explicit_miss(&mut self, task_id: TaskId, handler: &dyn CheckpointsMissedHandler) {
        let Some((peer_node_id, monitored)) = self.tasks.get_mut(&task_id) else {
            return;
        };
        monitored.missed_checkpoints += 1;
        if monitored.missed_checkpoints >= self.config.max_missed_checkpoints {
            handler.on_checkpoints_missed(task_id, *peer_node_id);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHandler(AtomicU32);
    impl CheckpointsMissedHandler for CountingHandler {
        fn on_checkpoints_missed(&self, _task_id: TaskId, _peer_node_id: PeerId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn explicit_miss_fires_handler_after_threshold() {
        let mut monitor = TaskMonitor::new(TaskMonitorConfig { max_missed_checkpoints: 2, ..Default::default() });
        let task_id = TaskId::new();
        monitor.track(task_id, PeerId::new());
        let handler = CountingHandler(AtomicU32::new(0));

        monitor.record_explicit_miss(task_id, &handler);
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);
        monitor.record_explicit_miss(task_id, &handler);
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn untracked_task_is_a_no_op() {
        let mut monitor = TaskMonitor::new(TaskMonitorConfig::default());
        let handler = CountingHandler(AtomicU32::new(0));
        monitor.record_explicit_miss(TaskId::new(), &handler);
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);
    }
}
