use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::StoreError;
use crate::journal::{PlantJournal, StoreOp, StoreRecord};
use crate::schema::{Plant, PlantId};

/// What changed in the plant collection.  Delivered to subscribers after the
/// write has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Upserted(PlantId),
    Deleted(PlantId),
    Cleared,
}

pub type ChangeCallback = Arc<dyn Fn(&StoreChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Durable, key-indexed plant collection with change notification.
///
/// Reads return owned snapshots that are internally consistent; no partial
/// write is ever visible.  Plants own their journal events, so `delete` and
/// `clear` remove events in the same write.
pub trait PlantStore: Send + Sync {
    /// Every plant in insertion order.
    fn fetch_all(&self) -> Result<Vec<Plant>, StoreError>;
    fn get(&self, id: PlantId) -> Result<Option<Plant>, StoreError>;
    /// Insert or replace by id.
    fn save(&self, plant: Plant) -> Result<(), StoreError>;
    /// Atomic read-modify-write.  Returns the committed plant, or `None`
    /// without writing anything when the id is unknown.
    fn update(
        &self,
        id: PlantId,
        apply: &mut dyn FnMut(&mut Plant),
    ) -> Result<Option<Plant>, StoreError>;
    /// Returns `false` when there was nothing to delete.
    fn delete(&self, id: PlantId) -> Result<bool, StoreError>;
    /// Removes every plant; returns how many were removed.
    fn clear(&self) -> Result<usize, StoreError>;
    fn subscribe(&self, on_change: ChangeCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// [`PlantStore`] backed by a [`PlantJournal`], or purely in memory.
///
/// Writers are serialised by a mutex.  Each write appends its record to the
/// journal before touching the in-memory collection, so a failed append
/// leaves both unchanged.  Subscribers run after the lock is released.
pub struct JournalStore {
    journal: Option<PlantJournal>,
    plants: Mutex<Vec<Plant>>,
    subscribers: Mutex<Vec<(SubscriptionId, ChangeCallback)>>,
    next_subscription: AtomicU64,
}

impl JournalStore {
    pub fn in_memory() -> Self {
        Self {
            journal: None,
            plants: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Open (or create) a journal and replay it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading garden from journal");
        let journal = PlantJournal::new(path);
        let records = journal.load()?;
        let record_count = records.len();

        let mut plants = Vec::new();
        for record in records {
            apply_op(&mut plants, record.op);
        }

        info!(records = record_count, plants = plants.len(), "garden loaded");
        Ok(Self {
            journal: Some(journal),
            plants: Mutex::new(plants),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(PlantJournal::path)
    }

    /// Rewrite the journal as one `Upsert` per live plant, dropping the
    /// history of superseded and deleted records.
    pub fn compact(&self) -> Result<usize, StoreError> {
        let plants = self.lock_plants();
        let Some(journal) = &self.journal else {
            return Ok(0);
        };
        let records = plants
            .iter()
            .cloned()
            .map(|plant| StoreRecord::new(StoreOp::Upsert { plant }))
            .collect::<Vec<_>>();
        journal.overwrite(&records)?;
        info!(plants = records.len(), "garden journal compacted");
        Ok(records.len())
    }

    fn lock_plants(&self) -> MutexGuard<'_, Vec<Plant>> {
        self.plants.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `op` durable, then apply it to `plants`.
    fn commit(&self, plants: &mut Vec<Plant>, op: StoreOp) -> Result<(), StoreError> {
        if let Some(journal) = &self.journal {
            journal.append(&StoreRecord::new(op.clone()))?;
        }
        apply_op(plants, op);
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect::<Vec<_>>();
        debug!(?change, subscribers = subscribers.len(), "store change");
        for callback in subscribers {
            callback(&change);
        }
    }
}

impl PlantStore for JournalStore {
    fn fetch_all(&self) -> Result<Vec<Plant>, StoreError> {
        Ok(self.lock_plants().clone())
    }

    fn get(&self, id: PlantId) -> Result<Option<Plant>, StoreError> {
        Ok(self.lock_plants().iter().find(|plant| plant.id == id).cloned())
    }

    fn save(&self, plant: Plant) -> Result<(), StoreError> {
        let id = plant.id;
        {
            let mut plants = self.lock_plants();
            self.commit(&mut plants, StoreOp::Upsert { plant })?;
        }
        self.notify(StoreChange::Upserted(id));
        Ok(())
    }

    fn update(
        &self,
        id: PlantId,
        apply: &mut dyn FnMut(&mut Plant),
    ) -> Result<Option<Plant>, StoreError> {
        let updated = {
            let mut plants = self.lock_plants();
            let Some(current) = plants.iter().find(|plant| plant.id == id) else {
                return Ok(None);
            };
            let mut next = current.clone();
            apply(&mut next);
            // The id is the key; a mutation must not re-key the plant.
            next.id = id;
            self.commit(&mut plants, StoreOp::Upsert { plant: next.clone() })?;
            next
        };
        self.notify(StoreChange::Upserted(id));
        Ok(Some(updated))
    }

    fn delete(&self, id: PlantId) -> Result<bool, StoreError> {
        {
            let mut plants = self.lock_plants();
            if !plants.iter().any(|plant| plant.id == id) {
                return Ok(false);
            }
            self.commit(&mut plants, StoreOp::Delete { plant_id: id })?;
        }
        self.notify(StoreChange::Deleted(id));
        Ok(true)
    }

    fn clear(&self) -> Result<usize, StoreError> {
        let removed = {
            let mut plants = self.lock_plants();
            let removed = plants.len();
            self.commit(&mut plants, StoreOp::Clear)?;
            removed
        };
        self.notify(StoreChange::Cleared);
        Ok(removed)
    }

    fn subscribe(&self, on_change: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, on_change));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }
}

fn apply_op(plants: &mut Vec<Plant>, op: StoreOp) {
    match op {
        StoreOp::Upsert { plant } => match plants.iter_mut().find(|p| p.id == plant.id) {
            Some(existing) => *existing = plant,
            None => plants.push(plant),
        },
        StoreOp::Delete { plant_id } => plants.retain(|plant| plant.id != plant_id),
        StoreOp::Clear => plants.clear(),
    }
}
