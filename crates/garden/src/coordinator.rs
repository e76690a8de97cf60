//! The schedule coordinator.
//!
//! Store callbacks only enqueue a [`StoreChange`]; all follow-up work
//! (projection, reminder reconciliation, achievement evaluation) runs when the
//! owner calls [`GardenCoordinator::process_changes`].  Each refresh publishes
//! a new immutable [`GardenSnapshot`] on a `watch` channel, so readers never
//! see a half-built view.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::achievements::{
    AchievementEngine, AchievementKey, AchievementStatus, AchievementStore, GardenStats,
};
use crate::clock::{CareClock, Clock};
use crate::error::{GardenError, GardenResult};
use crate::projector::{CareTask, CompletedEntry, TaskProjector};
use crate::reminders::{PendingReminder, ReminderReconciler, ReminderScheduler};
use crate::schema::{CareEventKind, IntervalDays, JournalDraft, Plant, PlantDraft, PlantId};
use crate::store::{PlantStore, StoreChange, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantSummary {
    pub id: PlantId,
    pub name: String,
    pub species: String,
    pub watering_interval_days: u32,
    pub last_watered_at: Option<DateTime<Utc>>,
    pub next_due_at: DateTime<Utc>,
    pub waterings: usize,
    pub journal_entries: usize,
}

/// Immutable view of the garden at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct GardenSnapshot {
    pub generated_at: DateTime<Utc>,
    pub plants: Vec<PlantSummary>,
    pub upcoming: Vec<CareTask>,
    pub overdue: Vec<CareTask>,
    pub completed_today: Vec<CompletedEntry>,
    pub achievements: Vec<AchievementStatus>,
    /// Achievements unlocked by the refresh that produced this snapshot.
    pub newly_unlocked: Vec<AchievementKey>,
    pub plant_count: usize,
    pub total_waterings: usize,
}

impl GardenSnapshot {
    pub fn empty(generated_at: DateTime<Utc>, achievements: Vec<AchievementStatus>) -> Self {
        Self {
            generated_at,
            plants: Vec::new(),
            upcoming: Vec::new(),
            overdue: Vec::new(),
            completed_today: Vec::new(),
            achievements,
            newly_unlocked: Vec::new(),
            plant_count: 0,
            total_waterings: 0,
        }
    }

    /// Copy of this snapshot with every trace of `id` removed.  Unlocks were
    /// already announced by the snapshot being pruned, so none carry over.
    pub fn without_plant(&self, id: PlantId) -> Self {
        let mut next = self.clone();
        next.newly_unlocked.clear();
        if let Some(removed) = next.plants.iter().find(|plant| plant.id == id) {
            next.total_waterings = next.total_waterings.saturating_sub(removed.waterings);
        }
        next.plants.retain(|plant| plant.id != id);
        next.upcoming.retain(|task| task.plant_id != id);
        next.overdue.retain(|task| task.plant_id != id);
        next.completed_today.retain(|entry| entry.plant_id != id);
        next.plant_count = next.plants.len();
        next
    }

    pub fn contains_plant(&self, id: PlantId) -> bool {
        self.plants.iter().any(|plant| plant.id == id)
            || self.upcoming.iter().any(|task| task.plant_id == id)
            || self.overdue.iter().any(|task| task.plant_id == id)
            || self.completed_today.iter().any(|entry| entry.plant_id == id)
    }
}

/// Everything a coordinator is built from.  Constructed once by the caller
/// and handed over; nothing here is global.
pub struct GardenParts {
    pub store: Arc<dyn PlantStore>,
    pub scheduler: Arc<dyn ReminderScheduler>,
    pub achievements: Box<dyn AchievementStore>,
    pub clock: Arc<dyn Clock>,
    pub care_clock: CareClock,
    pub reminder_time: NaiveTime,
    pub default_interval: IntervalDays,
}

pub struct GardenCoordinator {
    store: Arc<dyn PlantStore>,
    clock: Arc<dyn Clock>,
    projector: TaskProjector,
    reconciler: ReminderReconciler,
    engine: Mutex<AchievementEngine>,
    default_interval: IntervalDays,
    changes: Mutex<mpsc::UnboundedReceiver<StoreChange>>,
    subscription: SubscriptionId,
    snapshot_tx: watch::Sender<Arc<GardenSnapshot>>,
}

impl GardenCoordinator {
    /// Subscribe to the store and publish an initial snapshot.
    pub fn open(parts: GardenParts) -> GardenResult<Self> {
        let engine = AchievementEngine::new(parts.achievements)?;
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let subscription = parts.store.subscribe(Arc::new(move |change: &StoreChange| {
            // Enqueue only.  A closed receiver means the coordinator is gone.
            let _ = change_tx.send(change.clone());
        }));

        let initial = GardenSnapshot::empty(parts.clock.now(), engine.all());
        let (snapshot_tx, _) = watch::channel(Arc::new(initial));

        let coordinator = Self {
            store: parts.store,
            reconciler: ReminderReconciler::new(
                parts.scheduler,
                Arc::clone(&parts.clock),
                parts.care_clock,
                parts.reminder_time,
            ),
            clock: parts.clock,
            projector: TaskProjector::new(parts.care_clock),
            engine: Mutex::new(engine),
            default_interval: parts.default_interval,
            changes: Mutex::new(change_rx),
            subscription,
            snapshot_tx,
        };
        coordinator.refresh()?;
        Ok(coordinator)
    }

    pub fn care_clock(&self) -> &CareClock {
        self.projector.clock()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> Arc<GardenSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<GardenSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn plant(&self, id: PlantId) -> GardenResult<Option<Plant>> {
        Ok(self.store.get(id)?)
    }

    pub fn plants(&self) -> GardenResult<Vec<Plant>> {
        Ok(self.store.fetch_all()?)
    }

    pub fn pending_reminders(&self) -> anyhow::Result<Vec<PendingReminder>> {
        self.reconciler.scheduler().pending()
    }

    pub fn stats(&self) -> GardenResult<GardenStats> {
        let plants = self.store.fetch_all()?;
        Ok(self.lock_engine().stats(&plants))
    }

    /// Drain queued store changes and, if there were any, refresh once.
    /// Returns how many changes were coalesced.
    pub fn process_changes(&self) -> GardenResult<usize> {
        let mut drained = 0;
        {
            let mut changes = self.changes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            while let Ok(change) = changes.try_recv() {
                debug!(?change, "queued store change");
                drained += 1;
            }
        }
        if drained > 0 {
            self.refresh()?;
        }
        Ok(drained)
    }

    /// Rebuild and publish the snapshot from the store.
    pub fn refresh(&self) -> GardenResult<Arc<GardenSnapshot>> {
        let now = self.clock.now();
        let plants = self.store.fetch_all()?;
        let projection = self.projector.project(&plants, now);

        for task in &projection.upcoming {
            self.reconciler.reconcile(task.plant_id, task.due_at, &task.plant_name);
        }
        for task in &projection.overdue {
            self.reconciler.remove_all(task.plant_id);
        }

        let (evaluation, achievements) = {
            let mut engine = self.lock_engine();
            let evaluation = engine.evaluate(&plants)?;
            (evaluation, engine.all())
        };

        let summaries = plants
            .iter()
            .map(|plant| PlantSummary {
                id: plant.id,
                name: plant.name.clone(),
                species: plant.species.clone(),
                watering_interval_days: plant.watering_interval.days(),
                last_watered_at: plant.last_watered_at,
                next_due_at: self.projector.watering_task(plant, now).due_at,
                waterings: plant.watering_count(),
                journal_entries: plant.journal.len(),
            })
            .collect::<Vec<_>>();

        let snapshot = Arc::new(GardenSnapshot {
            generated_at: now,
            total_waterings: summaries.iter().map(|plant| plant.waterings).sum(),
            plant_count: summaries.len(),
            plants: summaries,
            upcoming: projection.upcoming,
            overdue: projection.overdue,
            completed_today: projection.completed_today,
            achievements,
            newly_unlocked: evaluation.newly_unlocked,
        });
        debug!(
            plants = snapshot.plant_count,
            upcoming = snapshot.upcoming.len(),
            overdue = snapshot.overdue.len(),
            "garden snapshot published"
        );
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn add_plant(&self, draft: PlantDraft) -> GardenResult<Plant> {
        let now = self.clock.now();
        let plant = draft.into_plant(now, self.default_interval)?;
        self.store.save(plant.clone())?;
        info!(plant = %plant.id, name = %plant.name, "plant added");
        self.reconcile_plant(&plant, now);
        Ok(plant)
    }

    /// Mark a care task done now.  Fails softly with `NotFound` when the
    /// plant has been deleted in the meantime.
    pub fn complete_task(&self, plant_id: PlantId, kind: CareEventKind) -> GardenResult<Plant> {
        self.log_entry(plant_id, JournalDraft::new(kind))
    }

    /// Append a journal entry in a single atomic store update and reconcile
    /// that plant's reminder.
    pub fn log_entry(&self, plant_id: PlantId, entry: JournalDraft) -> GardenResult<Plant> {
        let now = self.clock.now();
        let mut event = Some(entry.into_event(now));
        let kind = event.as_ref().map(|event| event.kind);
        let updated = self
            .store
            .update(plant_id, &mut |plant: &mut Plant| {
                if let Some(event) = event.take() {
                    plant.append_event(event);
                }
            })?
            .ok_or(GardenError::NotFound(plant_id))?;

        debug!(plant = %plant_id, ?kind, "journal entry logged");
        self.reconcile_plant(&updated, now);
        Ok(updated)
    }

    pub fn set_watering_interval(&self, plant_id: PlantId, days: u32) -> GardenResult<Plant> {
        let interval = IntervalDays::new(days)?;
        let updated = self
            .store
            .update(plant_id, &mut |plant: &mut Plant| plant.watering_interval = interval)?
            .ok_or(GardenError::NotFound(plant_id))?;
        info!(plant = %plant_id, days, "watering interval changed");
        self.reconcile_plant(&updated, self.clock.now());
        Ok(updated)
    }

    /// Delete a plant.  The published snapshot drops it first, then its
    /// reminders are cancelled, then the store deletes it with its events.
    pub fn delete_plant(&self, plant_id: PlantId) -> GardenResult<()> {
        if self.store.get(plant_id)?.is_none() {
            return Err(GardenError::NotFound(plant_id));
        }

        let pruned = self.snapshot().without_plant(plant_id);
        self.snapshot_tx.send_replace(Arc::new(pruned));
        self.reconciler.remove_all(plant_id);
        match self.store.delete(plant_id) {
            Ok(true) => {}
            Ok(false) => return Err(GardenError::NotFound(plant_id)),
            Err(err) => {
                warn!(plant = %plant_id, error = %err, "plant delete failed, restoring snapshot");
                self.restore_after_failed_write();
                return Err(err.into());
            }
        }
        info!(plant = %plant_id, "plant deleted");
        Ok(())
    }

    /// Delete every plant and cancel every reminder.  Achievements stay.
    pub fn wipe_all(&self) -> GardenResult<usize> {
        let achievements = self.lock_engine().all();
        self.snapshot_tx
            .send_replace(Arc::new(GardenSnapshot::empty(self.clock.now(), achievements)));
        self.reconciler.remove_everything();
        let removed = match self.store.clear() {
            Ok(removed) => removed,
            Err(err) => {
                warn!(error = %err, "garden wipe failed, restoring snapshot");
                self.restore_after_failed_write();
                return Err(err.into());
            }
        };
        info!(removed, "garden wiped");
        Ok(removed)
    }

    pub fn record_diagnosis_performed(&self) -> GardenResult<bool> {
        let first = self.lock_engine().record_diagnosis_performed()?;
        if first {
            self.refresh()?;
        }
        Ok(first)
    }

    pub fn record_visit(&self, date: NaiveDate) -> GardenResult<bool> {
        let new_day = self.lock_engine().record_visit(date)?;
        if new_day {
            self.refresh()?;
        }
        Ok(new_day)
    }

    pub fn record_visit_today(&self) -> GardenResult<bool> {
        let today = self.care_clock().local_date(self.clock.now());
        self.record_visit(today)
    }

    /// Republish from the store and reschedule its reminders after an
    /// optimistic removal whose write did not commit.
    fn restore_after_failed_write(&self) {
        if let Err(err) = self.refresh() {
            warn!(error = %err, "could not restore garden snapshot");
        }
    }

    fn reconcile_plant(&self, plant: &Plant, now: DateTime<Utc>) {
        let task = self.projector.watering_task(plant, now);
        self.reconciler.reconcile(plant.id, task.due_at, &plant.name);
    }

    fn lock_engine(&self) -> MutexGuard<'_, AchievementEngine> {
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for GardenCoordinator {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}
