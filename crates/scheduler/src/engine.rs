//! `SchedulerEngine`: ticks on a fixed interval, fires due schedules, and
//! persists state after every tick that changed something. The
//! `tokio::spawn` + `tokio::select!` loop racing `interval.tick()` against a
//! `shutdown_notify.notified()` is the same shape the teacher's
//! `DefaultAgentScheduler` uses for its dispatch loop, generalized here from
//! "schedule agents" to "fire cron/every/at triggers".

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fulcrum_common::SessionId;
use fulcrum_journal::Journal;
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::SchedulerError;
use crate::factory::SessionFactory;
use crate::store::ScheduleStore;
use crate::trigger::advance;
use crate::types::{JobKind, Schedule, ScheduleStatus};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_millis(500) }
    }
}

pub struct SchedulerEngine {
    store: ScheduleStore,
    journal: Arc<dyn Journal>,
    session_factory: Arc<dyn SessionFactory>,
    config: SchedulerConfig,
    schedules: RwLock<Vec<Schedule>>,
    shutdown_notify: Arc<Notify>,
}

impl SchedulerEngine {
    pub fn new(
        store: ScheduleStore,
        journal: Arc<dyn Journal>,
        session_factory: Arc<dyn SessionFactory>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        let schedules = store.load()?;
        Ok(Self {
            store,
            journal,
            session_factory,
            config,
            schedules: RwLock::new(schedules),
            shutdown_notify: Arc::new(Notify::new()),
        })
    }

    pub fn add_schedule(&self, schedule: Schedule) -> Result<(), SchedulerError> {
        self.schedules.write().push(schedule);
        self.persist()
    }

    pub fn remove_schedule(&self, schedule_id: fulcrum_common::ScheduleId) -> Result<(), SchedulerError> {
        self.schedules.write().retain(|s| s.schedule_id != schedule_id);
        self.persist()
    }

    pub fn list(&self) -> Vec<Schedule> {
        self.schedules.read().clone()
    }

    fn persist(&self) -> Result<(), SchedulerError> {
        self.store.save(&self.schedules.read())
    }

    /// Spawn the background tick loop. Dropping the returned handle does not
    /// stop the loop; call [`Self::shutdown`] for a graceful stop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let shutdown_notify = self.shutdown_notify.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = self.tick().await {
                            tracing::error!(error = %err, "scheduler tick failed");
                        }
                    }
                    _ = shutdown_notify.notified() => {
                        tracing::info!("scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.shutdown_notify.notify_waiters();
    }

    /// Advance every active schedule past `now` and fire the ones that are
    /// due. Exposed directly so tests can drive ticks deterministically
    /// without sleeping on the real clock.
    pub async fn tick(&self) -> Result<(), SchedulerError> {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&self, now: chrono::DateTime<Utc>) -> Result<(), SchedulerError> {
        let due: Vec<Schedule> = self
            .schedules
            .read()
            .iter()
            .filter(|s| s.status == ScheduleStatus::Active && s.next_run_at <= now)
            .cloned()
            .collect();
        if due.is_empty() {
            return Ok(());
        }

        let mut changed = false;
        for mut schedule in due {
            let (next_run_at, fires) = advance(&schedule.trigger, schedule.next_run_at, now, schedule.missed_fire_policy)?;
            schedule.next_run_at = next_run_at;
            schedule.updated_at = now;

            for _ in 0..fires {
                match self.run_job(&schedule).await {
                    Ok(()) => {
                        schedule.consecutive_failures = 0;
                    }
                    Err(err) => {
                        schedule.consecutive_failures += 1;
                        tracing::warn!(schedule_id = %schedule.schedule_id, error = %err, "scheduled job failed");
                        if schedule.consecutive_failures >= schedule.max_failures {
                            schedule.status = ScheduleStatus::Failed;
                        }
                    }
                }
            }

            if schedule.trigger.is_one_shot() && schedule.status == ScheduleStatus::Active {
                schedule.status = ScheduleStatus::Completed;
            }

            changed = true;
            self.replace(schedule);
        }

        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn replace(&self, schedule: Schedule) {
        let mut schedules = self.schedules.write();
        if let Some(slot) = schedules.iter_mut().find(|s| s.schedule_id == schedule.schedule_id) {
            *slot = schedule;
        }
    }

    async fn run_job(&self, schedule: &Schedule) -> Result<(), SchedulerError> {
        match &schedule.job {
            JobKind::CreateSession { task_text, mode, constraints, agentic } => {
                let session_id = self
                    .session_factory
                    .create_session(task_text.clone(), mode.clone(), constraints.clone(), *agentic)
                    .await?;
                self.journal
                    .emit(
                        session_id,
                        "schedule.fired",
                        json!({ "schedule_id": schedule.schedule_id, "job": "create_session" }),
                    )
                    .await
                    .map_err(|e| SchedulerError::JobFailed(e.to_string()))?;
                Ok(())
            }
            JobKind::EmitEvent { event_type, payload, session_id } => {
                let session_id = session_id.unwrap_or_else(SessionId::nil);
                self.journal
                    .emit(session_id, event_type, payload.clone())
                    .await
                    .map_err(|e| SchedulerError::JobFailed(e.to_string()))?;
                Ok(())
            }
        }
    }
}
