use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GardenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantId(Uuid);

impl PlantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// First 8 characters of the UUID, used as a compact display identifier.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for PlantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A watering interval in whole calendar days.  Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IntervalDays(u32);

impl IntervalDays {
    pub const DEFAULT: IntervalDays = IntervalDays(7);

    pub fn new(days: u32) -> Result<Self, GardenError> {
        if days == 0 {
            return Err(GardenError::InvalidInput(
                "watering interval must be at least one day".to_string(),
            ));
        }
        Ok(Self(days))
    }

    pub fn days(self) -> u32 {
        self.0
    }
}

impl Default for IntervalDays {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for IntervalDays {
    type Error = GardenError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl From<IntervalDays> for u32 {
    fn from(interval: IntervalDays) -> Self {
        interval.0
    }
}

/// Kinds of journal events.  Persisted with their display label; labels that
/// are not recognised decode as [`CareEventKind::NoteAdded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CareEventKind {
    Watered,
    Fertilized,
    Repotted,
    PhotoAdded,
    NoteAdded,
    HealthCheck,
}

impl CareEventKind {
    pub const ALL: [CareEventKind; 6] = [
        Self::Watered,
        Self::Fertilized,
        Self::Repotted,
        Self::PhotoAdded,
        Self::NoteAdded,
        Self::HealthCheck,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Watered => "Watered",
            Self::Fertilized => "Fertilized",
            Self::Repotted => "Repotted",
            Self::PhotoAdded => "New Photo",
            Self::NoteAdded => "Note",
            Self::HealthCheck => "Health Check",
        }
    }

    /// Parse a kind from its label or a CLI-friendly slug (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watered" | "water" => Some(Self::Watered),
            "fertilized" | "fertilize" => Some(Self::Fertilized),
            "repotted" | "repot" => Some(Self::Repotted),
            "new photo" | "photo" | "photo-added" | "photo_added" => Some(Self::PhotoAdded),
            "note" | "note-added" | "note_added" => Some(Self::NoteAdded),
            "health check" | "health-check" | "health_check" | "diagnosis" => {
                Some(Self::HealthCheck)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CareEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for CareEventKind {
    fn from(label: String) -> Self {
        Self::from_label(&label).unwrap_or(Self::NoteAdded)
    }
}

impl From<CareEventKind> for String {
    fn from(kind: CareEventKind) -> Self {
        kind.label().to_string()
    }
}

/// An immutable journal occurrence.  Always embedded in exactly one [`Plant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareEvent {
    pub id: EventId,
    pub kind: CareEventKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    /// Opaque reference to an attached image (path or URI).
    #[serde(default)]
    pub image: Option<String>,
}

impl CareEvent {
    pub fn new(kind: CareEventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            kind,
            occurred_at,
            note: None,
            image: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareGuide {
    pub watering: String,
    pub light: String,
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: PlantId,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub care_guide: Option<CareGuide>,
    pub acquired_at: DateTime<Utc>,
    /// Maximum timestamp among the `Watered` events in `journal`, or `None`
    /// when there are none.  Maintained by [`Plant::append_event`].
    pub last_watered_at: Option<DateTime<Utc>>,
    pub watering_interval: IntervalDays,
    #[serde(default)]
    pub journal: Vec<CareEvent>,
}

impl Plant {
    /// Append a journal event.  A `Watered` event advances `last_watered_at`
    /// in the same mutation, so the two can never be committed apart.
    pub fn append_event(&mut self, event: CareEvent) {
        if event.kind == CareEventKind::Watered {
            let newest = match self.last_watered_at {
                Some(previous) if previous >= event.occurred_at => previous,
                _ => event.occurred_at,
            };
            self.last_watered_at = Some(newest);
        }
        self.journal.push(event);
    }

    pub fn watering_count(&self) -> usize {
        self.journal
            .iter()
            .filter(|event| event.kind == CareEventKind::Watered)
            .count()
    }

    pub fn photo_count(&self) -> usize {
        self.journal.iter().filter(|event| event.has_image()).count()
    }

    /// Journal entries newest first.
    pub fn history(&self) -> Vec<&CareEvent> {
        let mut events = self.journal.iter().collect::<Vec<_>>();
        events.sort_by(|left, right| right.occurred_at.cmp(&left.occurred_at));
        events
    }
}

/// Input for creating a plant.  Validated before anything reaches the store.
#[derive(Debug, Clone, Default)]
pub struct PlantDraft {
    pub name: String,
    pub species: String,
    pub image: Option<String>,
    pub care_guide: Option<CareGuide>,
    /// `None` picks the configured default interval.
    pub watering_interval_days: Option<u32>,
}

impl PlantDraft {
    pub fn new(name: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            species: species.into(),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, days: u32) -> Self {
        self.watering_interval_days = Some(days);
        self
    }

    pub fn into_plant(
        self,
        acquired_at: DateTime<Utc>,
        default_interval: IntervalDays,
    ) -> Result<Plant, GardenError> {
        let name = self.name.trim().to_string();
        let species = self.species.trim().to_string();
        if name.is_empty() {
            return Err(GardenError::InvalidInput("plant name must not be empty".to_string()));
        }
        if species.is_empty() {
            return Err(GardenError::InvalidInput("species must not be empty".to_string()));
        }
        let watering_interval = match self.watering_interval_days {
            Some(days) => IntervalDays::new(days)?,
            None => default_interval,
        };

        Ok(Plant {
            id: PlantId::new(),
            name,
            species,
            image: self.image,
            care_guide: self.care_guide,
            acquired_at,
            last_watered_at: None,
            watering_interval,
            journal: Vec::new(),
        })
    }
}

/// Input for a journal entry logged against an existing plant.
#[derive(Debug, Clone)]
pub struct JournalDraft {
    pub kind: CareEventKind,
    pub note: Option<String>,
    pub image: Option<String>,
}

impl JournalDraft {
    pub fn new(kind: CareEventKind) -> Self {
        Self {
            kind,
            note: None,
            image: None,
        }
    }

    pub fn into_event(self, occurred_at: DateTime<Utc>) -> CareEvent {
        CareEvent {
            note: self.note.filter(|note| !note.trim().is_empty()),
            image: self.image,
            ..CareEvent::new(self.kind, occurred_at)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn plant() -> Plant {
        PlantDraft::new("Fern", "Nephrolepis exaltata")
            .into_plant(Utc::now(), IntervalDays::DEFAULT)
            .unwrap()
    }

    #[test]
    fn watered_event_advances_last_watered_at() {
        let mut plant = plant();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        plant.append_event(CareEvent::new(CareEventKind::Watered, at));
        assert_eq!(plant.last_watered_at, Some(at));
    }

    #[test]
    fn last_watered_at_tracks_maximum_watered_timestamp() {
        let mut plant = plant();
        let later = Utc.with_ymd_and_hms(2026, 3, 5, 8, 0, 0).unwrap();
        let earlier = later - Duration::days(3);
        plant.append_event(CareEvent::new(CareEventKind::Watered, later));
        plant.append_event(CareEvent::new(CareEventKind::Watered, earlier));
        assert_eq!(plant.last_watered_at, Some(later));
        assert_eq!(plant.watering_count(), 2);
    }

    #[test]
    fn other_events_leave_last_watered_at_alone() {
        let mut plant = plant();
        plant.append_event(CareEvent::new(CareEventKind::Fertilized, Utc::now()));
        plant.append_event(CareEvent::new(CareEventKind::NoteAdded, Utc::now()));
        assert_eq!(plant.last_watered_at, None);
        assert_eq!(plant.journal.len(), 2);
    }

    #[test]
    fn draft_rejects_blank_fields_and_zero_interval() {
        let now = Utc::now();
        let blank_name = PlantDraft::new("  ", "Ficus").into_plant(now, IntervalDays::DEFAULT);
        assert!(matches!(blank_name, Err(GardenError::InvalidInput(_))));

        let blank_species = PlantDraft::new("Fig", "").into_plant(now, IntervalDays::DEFAULT);
        assert!(matches!(blank_species, Err(GardenError::InvalidInput(_))));

        let zero = PlantDraft::new("Fig", "Ficus").with_interval(0).into_plant(now, IntervalDays::DEFAULT);
        assert!(matches!(zero, Err(GardenError::InvalidInput(_))));
    }

    #[test]
    fn draft_uses_default_interval_when_unset() {
        let interval = IntervalDays::new(3).unwrap();
        let plant = PlantDraft::new("Basil", "Ocimum basilicum")
            .into_plant(Utc::now(), interval)
            .unwrap();
        assert_eq!(plant.watering_interval.days(), 3);
        assert!(plant.journal.is_empty());
        assert!(plant.last_watered_at.is_none());
    }

    #[test]
    fn event_kind_persists_with_display_label() {
        let json = serde_json::to_string(&CareEventKind::PhotoAdded).unwrap();
        assert_eq!(json, "\"New Photo\"");
        let back: CareEventKind = serde_json::from_str("\"Health Check\"").unwrap();
        assert_eq!(back, CareEventKind::HealthCheck);
        let unknown: CareEventKind = serde_json::from_str("\"Pruned\"").unwrap();
        assert_eq!(unknown, CareEventKind::NoteAdded);
    }

    #[test]
    fn zero_interval_is_rejected_on_decode() {
        let result = serde_json::from_str::<IntervalDays>("0");
        assert!(result.is_err());
        let ok: IntervalDays = serde_json::from_str("10").unwrap();
        assert_eq!(ok.days(), 10);
    }

    #[test]
    fn history_is_newest_first() {
        let mut plant = plant();
        let first = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        plant.append_event(CareEvent::new(CareEventKind::Repotted, first));
        plant.append_event(CareEvent::new(CareEventKind::NoteAdded, first + Duration::hours(2)));
        let history = plant.history();
        assert_eq!(history[0].kind, CareEventKind::NoteAdded);
        assert_eq!(history[1].kind, CareEventKind::Repotted);
    }
}
