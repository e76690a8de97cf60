//! Pure derivation of care tasks from a plant snapshot.
//!
//! Every call recomputes the full projection from scratch; nothing is patched
//! in place, so a projection can never drift from the snapshot it came from.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::CareClock;
use crate::schema::{CareEvent, CareEventKind, Plant, PlantId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareTask {
    pub plant_id: PlantId,
    pub plant_name: String,
    pub kind: CareEventKind,
    pub due_at: DateTime<Utc>,
}

/// A journal event logged today, with enough context to display it without
/// reaching back into the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedEntry {
    pub plant_id: PlantId,
    pub plant_name: String,
    pub event: CareEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    /// Tasks due today or later, soonest first.
    pub upcoming: Vec<CareTask>,
    /// Tasks whose due date fell on an earlier calendar day, oldest first.
    pub overdue: Vec<CareTask>,
    /// Events logged since local midnight, newest first.
    pub completed_today: Vec<CompletedEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskProjector {
    clock: CareClock,
}

impl TaskProjector {
    pub fn new(clock: CareClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &CareClock {
        &self.clock
    }

    pub fn watering_task(&self, plant: &Plant, now: DateTime<Utc>) -> CareTask {
        CareTask {
            plant_id: plant.id,
            plant_name: plant.name.clone(),
            kind: CareEventKind::Watered,
            due_at: self
                .clock
                .next_due_date(plant.last_watered_at, plant.watering_interval, now),
        }
    }

    pub fn project(&self, plants: &[Plant], now: DateTime<Utc>) -> Projection {
        let start_of_day = self.clock.start_of_day(now);

        let (mut upcoming, mut overdue): (Vec<_>, Vec<_>) = plants
            .iter()
            .map(|plant| self.watering_task(plant, now))
            .partition(|task| task.due_at >= start_of_day);
        upcoming.sort_by(by_due_then_plant);
        overdue.sort_by(by_due_then_plant);

        let mut completed_today = plants
            .iter()
            .flat_map(|plant| {
                plant
                    .journal
                    .iter()
                    .filter(|event| event.occurred_at >= start_of_day)
                    .map(|event| CompletedEntry {
                        plant_id: plant.id,
                        plant_name: plant.name.clone(),
                        event: event.clone(),
                    })
            })
            .collect::<Vec<_>>();
        completed_today.sort_by(|left, right| {
            right
                .event
                .occurred_at
                .cmp(&left.event.occurred_at)
                .then_with(|| left.event.id.cmp(&right.event.id))
        });

        Projection {
            upcoming,
            overdue,
            completed_today,
        }
    }
}

fn by_due_then_plant(left: &CareTask, right: &CareTask) -> Ordering {
    left.due_at
        .cmp(&right.due_at)
        .then_with(|| left.plant_id.cmp(&right.plant_id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::schema::{IntervalDays, PlantDraft};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 14, 13, 0, 0).unwrap()
    }

    fn plant(name: &str, interval: u32, last_watered: Option<DateTime<Utc>>) -> Plant {
        let mut plant = PlantDraft::new(name, "Testus plantus")
            .with_interval(interval)
            .into_plant(now() - Duration::days(60), IntervalDays::DEFAULT)
            .unwrap();
        if let Some(at) = last_watered {
            plant.append_event(CareEvent::new(CareEventKind::Watered, at));
        }
        plant
    }

    #[test]
    fn never_watered_plant_is_due_today() {
        let projector = TaskProjector::new(CareClock::utc());
        let plants = vec![plant("Aloe", 7, None)];
        let projection = projector.project(&plants, now());
        assert_eq!(projection.upcoming.len(), 1);
        assert_eq!(projection.upcoming[0].due_at, now());
        assert!(projection.overdue.is_empty());
    }

    #[test]
    fn upcoming_sorted_by_due_date_then_plant_id() {
        let projector = TaskProjector::new(CareClock::utc());
        let watered = now() - Duration::days(1);
        let plants = vec![
            plant("Later", 10, Some(watered)),
            plant("Tie A", 3, Some(watered)),
            plant("Soon", 2, Some(watered)),
            plant("Tie B", 3, Some(watered)),
        ];

        let projection = projector.project(&plants, now());
        let due = projection.upcoming.iter().map(|task| task.due_at).collect::<Vec<_>>();
        let mut sorted = due.clone();
        sorted.sort();
        assert_eq!(due, sorted);
        assert_eq!(projection.upcoming[0].plant_name, "Soon");
        assert_eq!(projection.upcoming[3].plant_name, "Later");

        let ties = &projection.upcoming[1..3];
        assert!(ties[0].plant_id < ties[1].plant_id);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let projector = TaskProjector::new(CareClock::utc());
        let watered = now() - Duration::days(2);
        let plants = (0..6)
            .map(|i| plant(&format!("p{i}"), 4, Some(watered)))
            .collect::<Vec<_>>();

        let first = projector.project(&plants, now());
        let mut reversed = plants.clone();
        reversed.reverse();
        let second = projector.project(&reversed, now());
        assert_eq!(first.upcoming, second.upcoming);
    }

    #[test]
    fn tasks_due_before_today_are_overdue() {
        let projector = TaskProjector::new(CareClock::utc());
        let plants = vec![
            plant("Thirsty", 2, Some(now() - Duration::days(5))),
            plant("Fine", 7, Some(now() - Duration::days(1))),
            plant("This morning", 1, Some(now() - Duration::days(1) - Duration::hours(5))),
        ];

        let projection = projector.project(&plants, now());
        assert_eq!(projection.overdue.len(), 1);
        assert_eq!(projection.overdue[0].plant_name, "Thirsty");
        // Due at 08:00 today: late, but still today's task.
        assert_eq!(projection.upcoming[0].plant_name, "This morning");
        assert_eq!(projection.upcoming[1].plant_name, "Fine");
    }

    #[test]
    fn completed_today_lists_events_since_midnight_newest_first() {
        let projector = TaskProjector::new(CareClock::utc());
        let mut fern = plant("Fern", 7, Some(now() - Duration::days(1)));
        fern.append_event(CareEvent::new(CareEventKind::Watered, now() - Duration::hours(4)));
        let mut cactus = plant("Cactus", 21, None);
        cactus.append_event(CareEvent::new(CareEventKind::Fertilized, now() - Duration::hours(1)));
        cactus.append_event(CareEvent::new(CareEventKind::NoteAdded, now() - Duration::hours(20)));

        let projection = projector.project(&[fern, cactus], now());
        let kinds = projection
            .completed_today
            .iter()
            .map(|entry| (entry.plant_name.as_str(), entry.event.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ("Cactus", CareEventKind::Fertilized),
                ("Fern", CareEventKind::Watered),
            ]
        );
    }

    #[test]
    fn empty_garden_projects_nothing() {
        let projector = TaskProjector::new(CareClock::utc());
        assert_eq!(projector.project(&[], now()), Projection::default());
    }
}
