//! Watering reminders: the scheduler seam and the reconciler that keeps it in
//! step with the projected due dates.
//!
//! Platform schedulers have no update operation, so replacing a reminder is
//! always cancel-then-schedule.  At most one reminder is pending per plant.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{CareClock, Clock};
use crate::schema::PlantId;

pub const REMINDER_TITLE: &str = "Time to Water!";

pub fn reminder_body(plant_name: &str) -> String {
    format!("Your plant, {plant_name}, is thirsty. Don't forget to water it today.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReminder {
    pub plant_id: PlantId,
    pub fire_at: DateTime<Utc>,
    /// Wall-clock fire time in the garden's zone, which is what a
    /// calendar-based platform trigger is keyed on.
    pub fire_at_local: NaiveDateTime,
    pub title: String,
    pub body: String,
}

/// One-shot notification scheduler, keyed by plant id.
pub trait ReminderScheduler: Send + Sync {
    fn schedule(&self, reminder: PendingReminder) -> Result<()>;
    /// Remove every pending reminder for the plant.  Cancelling a plant with
    /// nothing pending succeeds.
    fn cancel(&self, plant_id: PlantId) -> Result<()>;
    fn cancel_all(&self) -> Result<()>;
    fn pending(&self) -> Result<Vec<PendingReminder>>;
}

/// Scheduler that only keeps reminders in memory.  Like the platform
/// schedulers it appends on every `schedule` call, so a missed cancel shows
/// up as a duplicate.
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    pending: Mutex<Vec<PendingReminder>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, plant_id: PlantId) -> usize {
        self.lock()
            .iter()
            .filter(|reminder| reminder.plant_id == plant_id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingReminder>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReminderScheduler for InMemoryScheduler {
    fn schedule(&self, reminder: PendingReminder) -> Result<()> {
        self.lock().push(reminder);
        Ok(())
    }

    fn cancel(&self, plant_id: PlantId) -> Result<()> {
        self.lock().retain(|reminder| reminder.plant_id != plant_id);
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }

    fn pending(&self) -> Result<Vec<PendingReminder>> {
        let mut pending = self.lock().clone();
        pending.sort_by_key(|reminder| (reminder.fire_at, reminder.plant_id));
        Ok(pending)
    }
}

/// Pending reminders kept in `{data_dir}/reminders.json` for a platform
/// notifier to pick up.  Every change rewrites the file atomically.
#[derive(Debug)]
pub struct ReminderOutbox {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ReminderOutbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<PendingReminder>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn write(&self, reminders: &[PendingReminder]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let rendered = serde_json::to_string_pretty(reminders)?;
        fs::write(&tmp_path, rendered)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn modify(&self, apply: impl FnOnce(&mut Vec<PendingReminder>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut reminders = self.read()?;
        apply(&mut reminders);
        self.write(&reminders)
    }
}

impl ReminderScheduler for ReminderOutbox {
    fn schedule(&self, reminder: PendingReminder) -> Result<()> {
        self.modify(|reminders| reminders.push(reminder))
    }

    fn cancel(&self, plant_id: PlantId) -> Result<()> {
        self.modify(|reminders| reminders.retain(|reminder| reminder.plant_id != plant_id))
    }

    fn cancel_all(&self) -> Result<()> {
        self.modify(Vec::clear)
    }

    fn pending(&self) -> Result<Vec<PendingReminder>> {
        let mut pending = self.read()?;
        pending.sort_by_key(|reminder| (reminder.fire_at, reminder.plant_id));
        Ok(pending)
    }
}

/// What the reconciler intends to do for one plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPlan {
    /// Nothing should be pending: the due date or its fire time has passed.
    Cancel,
    /// Exactly one reminder should be pending, at this time.
    Replace {
        fire_at: DateTime<Utc>,
        fire_at_local: NaiveDateTime,
    },
}

pub struct ReminderReconciler {
    scheduler: Arc<dyn ReminderScheduler>,
    clock: Arc<dyn Clock>,
    care: CareClock,
    time_of_day: NaiveTime,
}

impl ReminderReconciler {
    pub fn new(
        scheduler: Arc<dyn ReminderScheduler>,
        clock: Arc<dyn Clock>,
        care: CareClock,
        time_of_day: NaiveTime,
    ) -> Self {
        Self {
            scheduler,
            clock,
            care,
            time_of_day,
        }
    }

    /// 09:00 local.
    pub fn default_time_of_day() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn scheduler(&self) -> &Arc<dyn ReminderScheduler> {
        &self.scheduler
    }

    /// Pure decision: the reminder fires on the due date's local calendar day
    /// at the configured time of day, unless that moment is already past.
    pub fn plan(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> ReminderPlan {
        if due <= now {
            return ReminderPlan::Cancel;
        }
        let fire_local = self
            .care
            .at_local_time(self.care.local_date(due), self.time_of_day);
        let fire_at = fire_local.with_timezone(&Utc);
        if fire_at <= now {
            return ReminderPlan::Cancel;
        }
        ReminderPlan::Replace {
            fire_at,
            fire_at_local: fire_local.naive_local(),
        }
    }

    /// Bring the scheduler in line with `due` for one plant.  Scheduler
    /// failures are logged and swallowed; the next reconciliation retries.
    pub fn reconcile(&self, plant_id: PlantId, due: DateTime<Utc>, plant_name: &str) -> ReminderPlan {
        let plan = self.plan(due, self.clock.now());
        debug!(plant = %plant_id, ?plan, "reconciling reminder");

        if let Err(err) = self.scheduler.cancel(plant_id) {
            // Scheduling on top of a reminder we failed to remove could leave
            // two pending for the same plant.
            warn!(plant = %plant_id, error = %err, "failed to cancel reminder; not rescheduling");
            return plan;
        }

        if let ReminderPlan::Replace {
            fire_at,
            fire_at_local,
        } = plan
        {
            let reminder = PendingReminder {
                plant_id,
                fire_at,
                fire_at_local,
                title: REMINDER_TITLE.to_string(),
                body: reminder_body(plant_name),
            };
            if let Err(err) = self.scheduler.schedule(reminder) {
                warn!(plant = %plant_id, error = %err, "failed to schedule reminder");
            }
        }
        plan
    }

    pub fn remove_all(&self, plant_id: PlantId) {
        if let Err(err) = self.scheduler.cancel(plant_id) {
            warn!(plant = %plant_id, error = %err, "failed to cancel reminder");
        }
    }

    pub fn remove_everything(&self) {
        if let Err(err) = self.scheduler.cancel_all() {
            warn!(error = %err, "failed to cancel reminders");
        }
    }
}
