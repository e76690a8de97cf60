//! Achievement catalog and the rule engine that unlocks entries from
//! aggregate garden statistics.
//!
//! Unlocking is one-directional: once an achievement is written to the
//! ledger it stays unlocked even if the statistics that earned it regress.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schema::{CareEventKind, Plant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AchievementKey {
    PlantParent,
    GreenThumb,
    WateringWizard,
    FirstDiagnosis,
    Librarian,
    DedicatedGardener,
    Photographer,
}

impl AchievementKey {
    pub fn slug(self) -> &'static str {
        match self {
            Self::PlantParent => "plant-parent",
            Self::GreenThumb => "green-thumb",
            Self::WateringWizard => "watering-wizard",
            Self::FirstDiagnosis => "first-diagnosis",
            Self::Librarian => "librarian",
            Self::DedicatedGardener => "dedicated-gardener",
            Self::Photographer => "photographer",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        CATALOG
            .iter()
            .map(|definition| definition.key)
            .find(|key| key.slug() == slug)
    }
}

/// Aggregate statistics the unlock rules are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GardenStats {
    pub plant_count: usize,
    pub total_waterings: usize,
    pub photo_count: usize,
    pub diagnosis_performed: bool,
    /// Longest run of consecutive days with a recorded visit.
    pub visit_streak: usize,
}

impl GardenStats {
    pub fn collect(plants: &[Plant], ledger: &AchievementLedger) -> Self {
        Self {
            plant_count: plants.len(),
            total_waterings: plants
                .iter()
                .flat_map(|plant| &plant.journal)
                .filter(|event| event.kind == CareEventKind::Watered)
                .count(),
            photo_count: plants.iter().map(Plant::photo_count).sum(),
            diagnosis_performed: ledger.diagnosis_performed,
            visit_streak: longest_streak(&ledger.visits),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockRule {
    PlantCount(usize),
    TotalWaterings(usize),
    PhotoCount(usize),
    DiagnosisPerformed,
    VisitStreak(usize),
}

impl UnlockRule {
    pub fn is_satisfied(self, stats: &GardenStats) -> bool {
        match self {
            Self::PlantCount(n) => stats.plant_count >= n,
            Self::TotalWaterings(n) => stats.total_waterings >= n,
            Self::PhotoCount(n) => stats.photo_count >= n,
            Self::DiagnosisPerformed => stats.diagnosis_performed,
            Self::VisitStreak(n) => stats.visit_streak >= n,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementDefinition {
    pub key: AchievementKey,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    #[serde(skip)]
    pub rule: UnlockRule,
}

pub static CATALOG: [AchievementDefinition; 7] = [
    AchievementDefinition {
        key: AchievementKey::PlantParent,
        name: "Plant Parent",
        description: "Add your first plant to the garden.",
        icon: "plus.circle.fill",
        rule: UnlockRule::PlantCount(1),
    },
    AchievementDefinition {
        key: AchievementKey::GreenThumb,
        name: "Green Thumb",
        description: "Successfully keep 5 plants alive.",
        icon: "hand.thumbsup.fill",
        rule: UnlockRule::PlantCount(5),
    },
    AchievementDefinition {
        key: AchievementKey::WateringWizard,
        name: "Watering Wizard",
        description: "Water your plants 20 times.",
        icon: "drop.circle.fill",
        rule: UnlockRule::TotalWaterings(20),
    },
    AchievementDefinition {
        key: AchievementKey::FirstDiagnosis,
        name: "First Diagnosis",
        description: "Use the plant doctor for the first time.",
        icon: "cross.case.fill",
        rule: UnlockRule::DiagnosisPerformed,
    },
    AchievementDefinition {
        key: AchievementKey::Librarian,
        name: "Librarian",
        description: "Have a collection of 10 different plants.",
        icon: "books.vertical.fill",
        rule: UnlockRule::PlantCount(10),
    },
    AchievementDefinition {
        key: AchievementKey::DedicatedGardener,
        name: "Dedicated Gardener",
        description: "Log into the app 7 days in a row.",
        icon: "calendar.badge.clock",
        rule: UnlockRule::VisitStreak(7),
    },
    AchievementDefinition {
        key: AchievementKey::Photographer,
        name: "Photographer",
        description: "Add 10 photos to your plant journals.",
        icon: "photo.stack.fill",
        rule: UnlockRule::PhotoCount(10),
    },
];

pub fn definition(key: AchievementKey) -> &'static AchievementDefinition {
    CATALOG
        .iter()
        .find(|definition| definition.key == key)
        .unwrap_or(&CATALOG[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockState {
    Locked,
    Unlocked,
}

impl UnlockState {
    /// `Unlocked` is terminal; nothing moves an achievement back.
    pub fn advance(self, satisfied: bool) -> Self {
        match (self, satisfied) {
            (Self::Locked, true) | (Self::Unlocked, _) => Self::Unlocked,
            (Self::Locked, false) => Self::Locked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    pub definition: &'static AchievementDefinition,
    pub state: UnlockState,
}

impl AchievementStatus {
    pub fn is_unlocked(&self) -> bool {
        self.state == UnlockState::Unlocked
    }
}

/// Durable achievement state.  Keys are kept as strings so entries written
/// by a newer catalog survive a round trip through an older one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementLedger {
    pub unlocked: BTreeSet<String>,
    pub visits: BTreeSet<NaiveDate>,
    pub diagnosis_performed: bool,
}

pub trait AchievementStore: Send + Sync {
    fn load(&self) -> Result<AchievementLedger, StoreError>;
    fn save(&self, ledger: &AchievementLedger) -> Result<(), StoreError>;
}

/// Ledger in a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonAchievementStore {
    path: PathBuf,
}

impl JsonAchievementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AchievementStore for JsonAchievementStore {
    fn load(&self) -> Result<AchievementLedger, StoreError> {
        if !self.path.exists() {
            return Ok(AchievementLedger::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(AchievementLedger::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, ledger: &AchievementLedger) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(ledger)?)?;
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAchievementStore {
    ledger: Mutex<AchievementLedger>,
}

impl AchievementStore for MemoryAchievementStore {
    fn load(&self) -> Result<AchievementLedger, StoreError> {
        Ok(self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, ledger: &AchievementLedger) -> Result<(), StoreError> {
        *self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = ledger.clone();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Every achievement whose rule holds right now.
    pub satisfied: BTreeSet<AchievementKey>,
    /// Achievements that moved to unlocked in this evaluation, catalog order.
    pub newly_unlocked: Vec<AchievementKey>,
}

pub struct AchievementEngine {
    store: Box<dyn AchievementStore>,
    ledger: AchievementLedger,
    unlocked: BTreeSet<AchievementKey>,
}

impl AchievementEngine {
    pub fn new(store: Box<dyn AchievementStore>) -> Result<Self, StoreError> {
        let ledger = store.load()?;
        let mut unlocked = BTreeSet::new();
        for slug in &ledger.unlocked {
            match AchievementKey::from_slug(slug) {
                Some(key) => {
                    unlocked.insert(key);
                }
                None => warn!(key = %slug, "unknown achievement in ledger — skipping"),
            }
        }
        Ok(Self {
            store,
            ledger,
            unlocked,
        })
    }

    pub fn stats(&self, plants: &[Plant]) -> GardenStats {
        GardenStats::collect(plants, &self.ledger)
    }

    /// Evaluate every rule against `plants`.  Newly satisfied achievements are
    /// persisted before they are reported; if the write fails nothing changes.
    pub fn evaluate(&mut self, plants: &[Plant]) -> Result<Evaluation, StoreError> {
        let stats = self.stats(plants);
        let mut evaluation = Evaluation::default();

        for definition in &CATALOG {
            let satisfied = definition.rule.is_satisfied(&stats);
            if satisfied {
                evaluation.satisfied.insert(definition.key);
            }
            let before = self.state_of(definition.key);
            if before.advance(satisfied) != before {
                evaluation.newly_unlocked.push(definition.key);
            }
        }

        if evaluation.newly_unlocked.is_empty() {
            return Ok(evaluation);
        }

        let mut next = self.ledger.clone();
        next.unlocked
            .extend(evaluation.newly_unlocked.iter().map(|key| key.slug().to_string()));
        self.store.save(&next)?;
        self.ledger = next;
        for key in &evaluation.newly_unlocked {
            self.unlocked.insert(*key);
            info!(achievement = key.slug(), "achievement unlocked");
        }
        Ok(evaluation)
    }

    /// Returns `true` the first time it is called.
    pub fn record_diagnosis_performed(&mut self) -> Result<bool, StoreError> {
        if self.ledger.diagnosis_performed {
            return Ok(false);
        }
        let mut next = self.ledger.clone();
        next.diagnosis_performed = true;
        self.store.save(&next)?;
        self.ledger = next;
        Ok(true)
    }

    /// Returns `true` if `date` had not been recorded yet.
    pub fn record_visit(&mut self, date: NaiveDate) -> Result<bool, StoreError> {
        if self.ledger.visits.contains(&date) {
            return Ok(false);
        }
        let mut next = self.ledger.clone();
        next.visits.insert(date);
        self.store.save(&next)?;
        self.ledger = next;
        Ok(true)
    }

    pub fn state_of(&self, key: AchievementKey) -> UnlockState {
        if self.unlocked.contains(&key) {
            UnlockState::Unlocked
        } else {
            UnlockState::Locked
        }
    }

    pub fn is_unlocked(&self, key: AchievementKey) -> bool {
        self.state_of(key) == UnlockState::Unlocked
    }

    /// The whole catalog with unlock state, in catalog order.
    pub fn all(&self) -> Vec<AchievementStatus> {
        CATALOG
            .iter()
            .map(|definition| AchievementStatus {
                definition,
                state: self.state_of(definition.key),
            })
            .collect()
    }

    pub fn ledger(&self) -> &AchievementLedger {
        &self.ledger
    }
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        current = match previous {
            Some(prev) if prev.succ_opt() == Some(*day) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(*day);
    }
    longest
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::schema::{CareEvent, IntervalDays, PlantDraft};

    fn plants(n: usize) -> Vec<Plant> {
        (0..n)
            .map(|i| {
                PlantDraft::new(format!("plant {i}"), "Hedera helix")
                    .into_plant(Utc::now(), IntervalDays::DEFAULT)
                    .unwrap()
            })
            .collect()
    }

    fn engine() -> AchievementEngine {
        AchievementEngine::new(Box::new(MemoryAchievementStore::default())).unwrap()
    }

    fn water(plant: &mut Plant, times: usize) {
        for _ in 0..times {
            plant.append_event(CareEvent::new(CareEventKind::Watered, Utc::now()));
        }
    }

    #[test]
    fn catalog_keys_are_unique_and_round_trip() {
        let keys = CATALOG.iter().map(|d| d.key).collect::<BTreeSet<_>>();
        assert_eq!(keys.len(), CATALOG.len());
        for entry in &CATALOG {
            assert_eq!(AchievementKey::from_slug(entry.key.slug()), Some(entry.key));
            assert_eq!(definition(entry.key).name, entry.name);
        }
        assert_eq!(AchievementKey::from_slug("gold-medal"), None);
    }

    #[test]
    fn unlock_state_is_terminal() {
        assert_eq!(UnlockState::Locked.advance(false), UnlockState::Locked);
        assert_eq!(UnlockState::Locked.advance(true), UnlockState::Unlocked);
        assert_eq!(UnlockState::Unlocked.advance(false), UnlockState::Unlocked);
    }

    #[test]
    fn five_plants_unlock_green_thumb_and_it_survives_deletion() {
        let mut engine = engine();
        let mut garden = plants(5);

        let first = engine.evaluate(&garden).unwrap();
        assert_eq!(
            first.newly_unlocked,
            vec![AchievementKey::PlantParent, AchievementKey::GreenThumb]
        );

        garden.truncate(3);
        let second = engine.evaluate(&garden).unwrap();
        assert!(second.newly_unlocked.is_empty());
        assert!(!second.satisfied.contains(&AchievementKey::GreenThumb));
        assert!(engine.is_unlocked(AchievementKey::GreenThumb));
    }

    #[test]
    fn watering_wizard_reports_once() {
        let mut engine = engine();
        let mut garden = plants(2);
        water(&mut garden[0], 12);
        water(&mut garden[1], 7);
        let before = engine.evaluate(&garden).unwrap();
        assert!(!before.newly_unlocked.contains(&AchievementKey::WateringWizard));

        water(&mut garden[1], 1);
        let twentieth = engine.evaluate(&garden).unwrap();
        assert_eq!(twentieth.newly_unlocked, vec![AchievementKey::WateringWizard]);

        water(&mut garden[0], 1);
        let twenty_first = engine.evaluate(&garden).unwrap();
        assert!(twenty_first.newly_unlocked.is_empty());
        assert!(twenty_first.satisfied.contains(&AchievementKey::WateringWizard));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let mut engine = engine();
        let garden = plants(1);
        assert_eq!(engine.evaluate(&garden).unwrap().newly_unlocked.len(), 1);
        assert!(engine.evaluate(&garden).unwrap().newly_unlocked.is_empty());
        assert!(engine.evaluate(&garden).unwrap().newly_unlocked.is_empty());
    }

    #[test]
    fn photos_count_events_with_images() {
        let mut engine = engine();
        let mut garden = plants(1);
        for i in 0..10 {
            let mut event = CareEvent::new(CareEventKind::PhotoAdded, Utc::now());
            event.image = Some(format!("photos/{i}.jpg"));
            garden[0].append_event(event);
        }
        garden[0].append_event(CareEvent::new(CareEventKind::NoteAdded, Utc::now()));
        assert_eq!(engine.stats(&garden).photo_count, 10);
        let evaluation = engine.evaluate(&garden).unwrap();
        assert!(evaluation.newly_unlocked.contains(&AchievementKey::Photographer));
    }

    #[test]
    fn diagnosis_flag_unlocks_first_diagnosis() {
        let mut engine = engine();
        assert!(engine.record_diagnosis_performed().unwrap());
        assert!(!engine.record_diagnosis_performed().unwrap());
        let evaluation = engine.evaluate(&[]).unwrap();
        assert_eq!(evaluation.newly_unlocked, vec![AchievementKey::FirstDiagnosis]);
    }

    #[test]
    fn seven_consecutive_visits_unlock_dedicated_gardener() {
        let mut engine = engine();
        let start = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        for offset in [0, 1, 2, 4, 5, 6, 7, 8, 9] {
            engine.record_visit(start + Duration::days(offset)).unwrap();
        }
        assert_eq!(engine.stats(&[]).visit_streak, 6);
        assert!(!engine.evaluate(&[]).unwrap().satisfied.contains(&AchievementKey::DedicatedGardener));

        assert!(engine.record_visit(start + Duration::days(10)).unwrap());
        assert!(!engine.record_visit(start + Duration::days(10)).unwrap());
        let evaluation = engine.evaluate(&[]).unwrap();
        assert_eq!(evaluation.newly_unlocked, vec![AchievementKey::DedicatedGardener]);
    }

    #[test]
    fn unlocks_persist_across_engines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("achievements.json");
        {
            let mut engine =
                AchievementEngine::new(Box::new(JsonAchievementStore::new(&path))).unwrap();
            engine.evaluate(&plants(5)).unwrap();
        }

        let mut reopened = AchievementEngine::new(Box::new(JsonAchievementStore::new(&path))).unwrap();
        assert!(reopened.is_unlocked(AchievementKey::GreenThumb));
        assert!(reopened.evaluate(&plants(5)).unwrap().newly_unlocked.is_empty());
        let unlocked = reopened.all().iter().filter(|s| s.is_unlocked()).count();
        assert_eq!(unlocked, 2);
    }

    #[test]
    fn unknown_keys_are_skipped_but_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("achievements.json");
        std::fs::write(&path, r#"{"unlocked":["plant-parent","moon-gardener"]}"#).unwrap();

        let mut engine = AchievementEngine::new(Box::new(JsonAchievementStore::new(&path))).unwrap();
        assert!(engine.is_unlocked(AchievementKey::PlantParent));
        engine.evaluate(&plants(5)).unwrap();

        let ledger = JsonAchievementStore::new(&path).load().unwrap();
        assert!(ledger.unlocked.contains("moon-gardener"));
        assert!(ledger.unlocked.contains("green-thumb"));
    }

    #[test]
    fn failed_save_leaves_achievements_locked() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let store = JsonAchievementStore::new(blocker.join("achievements.json"));

        let mut engine = AchievementEngine::new(Box::new(store)).unwrap();
        assert!(engine.evaluate(&plants(1)).is_err());
        assert!(!engine.is_unlocked(AchievementKey::PlantParent));
        assert!(engine.all().iter().all(|status| !status.is_unlocked()));
    }

    #[test]
    fn all_follows_catalog_order() {
        let engine = engine();
        let names = engine
            .all()
            .iter()
            .map(|status| status.definition.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Plant Parent",
                "Green Thumb",
                "Watering Wizard",
                "First Diagnosis",
                "Librarian",
                "Dedicated Gardener",
                "Photographer",
            ]
        );
    }
}
