//! Durable JSON-lines store for schedules (spec.md §4.8): one schedule per
//! line, full rewrite on every save via write-temp-then-rename so a crash
//! mid-save never leaves a half-written file. Load tolerates malformed
//! lines by skipping them, logging a warning, rather than failing the
//! whole scheduler over one bad record.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SchedulerError;
use crate::types::Schedule;

pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn load(&self) -> Result<Vec<Schedule>, SchedulerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let mut schedules = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Schedule>(line) {
                Ok(schedule) => schedules.push(schedule),
                Err(err) => {
                    tracing::warn!(line = lineno, error = %err, "skipping malformed schedule record");
                }
            }
        }
        Ok(schedules)
    }

    pub fn save(&self, schedules: &[Schedule]) -> Result<(), SchedulerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut buf = String::new();
        for schedule in schedules {
            buf.push_str(&serde_json::to_string(schedule)?);
            buf.push('\n');
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, buf.as_bytes())?;
        {
            let tmp_file = fs::File::open(&tmp_path)?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobKind, MissedFirePolicy, Schedule, ScheduleTrigger};

    fn sample() -> Schedule {
        Schedule::new(
            ScheduleTrigger::Every { interval_ms: 60_000, start_at: None },
            JobKind::EmitEvent { event_type: "tick".to_string(), payload: serde_json::json!({}), session_id: None },
            MissedFirePolicy::Skip,
            3,
        )
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path().join("schedules.ndjson"));
        let schedules = vec![sample(), sample()];
        store.save(&schedules).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].schedule_id, schedules[0].schedule_id);
    }

    #[test]
    fn load_on_absent_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path().join("missing.ndjson"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.ndjson");
        let good = serde_json::to_string(&sample()).unwrap();
        std::fs::write(&path, format!("{good}\nnot json at all\n{good}\n")).unwrap();

        let store = ScheduleStore::new(path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
