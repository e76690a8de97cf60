//! Plant care scheduling: the garden model, due-date projection, reminder
//! reconciliation and achievements.

pub mod achievements;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod guides;
pub mod journal;
pub mod projector;
pub mod reminders;
pub mod schema;
pub mod store;

pub use achievements::{
    AchievementEngine, AchievementKey, AchievementLedger, AchievementStatus, AchievementStore,
    Evaluation, GardenStats, JsonAchievementStore, MemoryAchievementStore, UnlockState, CATALOG,
};
pub use clock::{resolve_timezone, CareClock, Clock, DueStatus, ManualClock, SystemClock};
pub use coordinator::{GardenCoordinator, GardenParts, GardenSnapshot, PlantSummary};
pub use error::{GardenError, GardenResult, StoreError};
pub use guides::{LightLevel, LightReading, PlantType};
pub use projector::{CareTask, CompletedEntry, Projection, TaskProjector};
pub use reminders::{
    InMemoryScheduler, PendingReminder, ReminderOutbox, ReminderPlan, ReminderReconciler,
    ReminderScheduler,
};
pub use schema::{
    CareEvent, CareEventKind, CareGuide, EventId, IntervalDays, JournalDraft, Plant, PlantDraft,
    PlantId,
};
pub use store::{JournalStore, PlantStore, StoreChange};
