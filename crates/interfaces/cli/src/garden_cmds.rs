use std::io;
use std::io::IsTerminal;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, NaiveTime, Utc};
use tracing::info;

use verdant_config::AppConfig;
use verdant_garden::{
    CareClock, CareEventKind, Clock, GardenCoordinator, GardenError, GardenParts, GardenSnapshot,
    IntervalDays, JournalDraft, JournalStore, JsonAchievementStore, Plant, PlantDraft, PlantId,
    ReminderOutbox, SystemClock, achievements, resolve_timezone,
};

pub(crate) struct Garden {
    pub(crate) coordinator: GardenCoordinator,
    store: Arc<JournalStore>,
}

pub(crate) fn open_garden(config: &AppConfig) -> Result<Garden> {
    let store = Arc::new(JournalStore::open(config.journal_path())?);
    let reminder_time = NaiveTime::from_hms_opt(config.reminders.hour, config.reminders.minute, 0)
        .ok_or_else(|| {
            anyhow!(
                "invalid reminder time {:02}:{:02} in [reminders]",
                config.reminders.hour,
                config.reminders.minute
            )
        })?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tz = resolve_timezone(&config.reminders.timezone);

    let coordinator = GardenCoordinator::open(GardenParts {
        store: store.clone(),
        scheduler: Arc::new(ReminderOutbox::new(config.reminders_path())),
        achievements: Box::new(JsonAchievementStore::new(config.achievements_path())),
        clock,
        care_clock: CareClock::new(tz),
        reminder_time,
        default_interval: IntervalDays::new(config.garden.default_watering_interval_days)?,
    })?;
    info!(data_dir = %config.data_dir().display(), %tz, "garden opened");

    Ok(Garden { coordinator, store })
}

impl Garden {
    /// Count today as a visit and bring the published snapshot up to date.
    pub(crate) fn begin_session(&self) -> Result<()> {
        announce_unlocks(&self.coordinator.snapshot());
        if self.coordinator.record_visit_today()? {
            announce_unlocks(&self.coordinator.snapshot());
        }
        self.settle()
    }

    /// Apply queued store changes and report any achievements they unlocked.
    pub(crate) fn settle(&self) -> Result<()> {
        if self.coordinator.process_changes()? > 0 {
            announce_unlocks(&self.coordinator.snapshot());
        }
        Ok(())
    }

    pub(crate) fn find(&self, query: &str) -> Result<Plant> {
        find_plant(self.coordinator.plants()?, query)
    }

    fn local_time(&self, at: DateTime<Utc>) -> String {
        let tz = self.coordinator.care_clock().tz();
        at.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Resolve a plant by full id, id prefix (4+ characters) or exact name
/// (case-insensitive).
pub(crate) fn find_plant(plants: Vec<Plant>, query: &str) -> Result<Plant> {
    let query = query.trim();
    if let Ok(id) = query.parse::<PlantId>() {
        return plants
            .into_iter()
            .find(|plant| plant.id == id)
            .ok_or_else(|| anyhow!("no plant with id {id}"));
    }

    let needle = query.to_lowercase();
    let mut matches = plants
        .into_iter()
        .filter(|plant| {
            plant.name.to_lowercase() == needle
                || (needle.len() >= 4 && plant.id.to_string().starts_with(&needle))
        })
        .collect::<Vec<_>>();

    match matches.len() {
        0 => bail!("no plant matches '{query}'"),
        1 => Ok(matches.remove(0)),
        _ => {
            let candidates = matches
                .iter()
                .map(|plant| format!("{} ({})", plant.name, plant.id.short()))
                .collect::<Vec<_>>()
                .join(", ");
            bail!("'{query}' matches several plants: {candidates}")
        }
    }
}

fn parse_kind(kind: &str) -> Result<CareEventKind> {
    CareEventKind::from_label(kind).ok_or_else(|| {
        let known = CareEventKind::ALL
            .iter()
            .map(|kind| kind.label())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!("unknown entry kind '{kind}' (expected one of: {known})")
    })
}

pub(crate) fn announce_unlocks(snapshot: &GardenSnapshot) {
    for key in &snapshot.newly_unlocked {
        let definition = achievements::definition(*key);
        println!("🏆 achievement unlocked: {} ({})", definition.name, definition.description);
    }
}

pub(crate) fn run_add(
    garden: &Garden,
    name: String,
    species: String,
    interval: Option<u32>,
    image: Option<String>,
) -> Result<()> {
    let draft = PlantDraft {
        name,
        species,
        image,
        care_guide: None,
        watering_interval_days: interval,
    };
    let plant = garden.coordinator.add_plant(draft)?;
    println!(
        "added {} ({}) — water every {} days",
        plant.name,
        plant.id.short(),
        plant.watering_interval.days()
    );
    garden.settle()
}

pub(crate) fn run_list(garden: &Garden) {
    let snapshot = garden.coordinator.snapshot();
    if snapshot.plants.is_empty() {
        println!("no plants yet — add one with `verdant add <name> --species <species>`");
        return;
    }

    let care = garden.coordinator.care_clock();
    let now = garden.coordinator.now();
    println!("── my plants ────────────────────────────────────────");
    for plant in &snapshot.plants {
        println!(
            "  {}  {:<20} {:<28} every {:>2}d  {}",
            plant.id.short(),
            plant.name,
            plant.species,
            plant.watering_interval_days,
            care.due_status(plant.next_due_at, now)
        );
    }
    println!("  ({} plants)", snapshot.plant_count);
}

pub(crate) fn run_show(garden: &Garden, query: &str) -> Result<()> {
    let plant = garden.find(query)?;
    let care = garden.coordinator.care_clock();
    let now = garden.coordinator.now();
    let due = care.next_due_date(plant.last_watered_at, plant.watering_interval, now);

    println!("── {} ──────────────────────────────────────", plant.name);
    println!("  id        : {}", plant.id);
    println!("  species   : {}", plant.species);
    println!("  acquired  : {}", garden.local_time(plant.acquired_at));
    println!("  interval  : every {} days", plant.watering_interval.days());
    println!(
        "  watered   : {}",
        plant
            .last_watered_at
            .map(|at| garden.local_time(at))
            .unwrap_or_else(|| "(never)".to_string())
    );
    println!("  next due  : {} ({})", garden.local_time(due), care.due_status(due, now));
    if let Some(image) = &plant.image {
        println!("  photo     : {image}");
    }
    if let Some(guide) = &plant.care_guide {
        println!();
        println!("── care guide ───────────────────────────────────────");
        println!("  watering    : {}", guide.watering);
        println!("  light       : {}", guide.light);
        println!("  temperature : {}", guide.temperature);
    }

    println!();
    println!("── journal ──────────────────────────────────────────");
    let history = plant.history();
    if history.is_empty() {
        println!("  (no entries)");
    }
    for event in history {
        let note = event.note.as_deref().unwrap_or("");
        let image = if event.has_image() { " 📷" } else { "" };
        println!(
            "  {}  {:<12} {note}{image}",
            garden.local_time(event.occurred_at),
            event.kind.label()
        );
    }
    Ok(())
}

pub(crate) fn run_complete(garden: &Garden, query: &str, kind: &str) -> Result<()> {
    let kind = parse_kind(kind)?;
    let plant = garden.find(query)?;
    log_and_report(garden, plant.id, JournalDraft::new(kind))
}

pub(crate) fn run_log(
    garden: &Garden,
    query: &str,
    kind: &str,
    note: Option<String>,
    image: Option<String>,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let plant = garden.find(query)?;
    let entry = JournalDraft { kind, note, image };
    log_and_report(garden, plant.id, entry)
}

fn log_and_report(garden: &Garden, plant_id: PlantId, entry: JournalDraft) -> Result<()> {
    let kind = entry.kind;
    match garden.coordinator.log_entry(plant_id, entry) {
        Ok(plant) => {
            let care = garden.coordinator.care_clock();
            let now = garden.coordinator.now();
            let due = care.next_due_date(plant.last_watered_at, plant.watering_interval, now);
            println!(
                "{}: {} logged — next watering {}",
                plant.name,
                kind.label(),
                care.due_status(due, now)
            );
        }
        Err(GardenError::NotFound(_)) => {
            println!("plant was removed before the entry could be logged; nothing changed");
        }
        Err(err) => return Err(err.into()),
    }
    garden.settle()
}

pub(crate) fn run_interval(garden: &Garden, query: &str, days: u32) -> Result<()> {
    let plant = garden.find(query)?;
    let updated = garden.coordinator.set_watering_interval(plant.id, days)?;
    println!("{}: water every {} days", updated.name, updated.watering_interval.days());
    garden.settle()
}

pub(crate) fn run_delete(garden: &Garden, query: &str) -> Result<()> {
    let plant = garden.find(query)?;
    match garden.coordinator.delete_plant(plant.id) {
        Ok(()) => println!("deleted {} ({}) and its journal", plant.name, plant.id.short()),
        Err(GardenError::NotFound(_)) => println!("{} was already deleted", plant.name),
        Err(err) => return Err(err.into()),
    }
    garden.settle()
}

pub(crate) fn run_schedule(garden: &Garden) {
    let snapshot = garden.coordinator.snapshot();
    let care = garden.coordinator.care_clock();
    let now = garden.coordinator.now();

    if !snapshot.overdue.is_empty() {
        println!("── overdue ──────────────────────────────────────────");
        for task in &snapshot.overdue {
            println!(
                "  {:<20} {:<10} {}",
                task.plant_name,
                task.kind.label(),
                care.due_status(task.due_at, now)
            );
        }
        println!();
    }

    println!("── upcoming ─────────────────────────────────────────");
    if snapshot.upcoming.is_empty() {
        println!("  (nothing scheduled)");
    }
    for task in &snapshot.upcoming {
        println!(
            "  {:<20} {:<10} {}",
            task.plant_name,
            task.kind.label(),
            care.due_status(task.due_at, now)
        );
    }

    println!();
    println!("── completed today ──────────────────────────────────");
    if snapshot.completed_today.is_empty() {
        println!("  (nothing yet)");
    }
    for entry in &snapshot.completed_today {
        println!(
            "  {:<20} {:<12} {}",
            entry.plant_name,
            entry.event.kind.label(),
            garden.local_time(entry.event.occurred_at)
        );
    }
}

pub(crate) fn run_achievements(garden: &Garden) {
    let snapshot = garden.coordinator.snapshot();
    println!("── achievements ─────────────────────────────────────");
    for status in &snapshot.achievements {
        let mark = if status.is_unlocked() { "✔" } else { "·" };
        println!(
            "  {mark} {:<20} {}",
            status.definition.name, status.definition.description
        );
    }
}

pub(crate) fn run_profile(garden: &Garden) -> Result<()> {
    let snapshot = garden.coordinator.snapshot();
    let stats = garden.coordinator.stats()?;
    let unlocked = snapshot
        .achievements
        .iter()
        .filter(|status| status.is_unlocked())
        .count();

    println!("── profile ──────────────────────────────────────────");
    println!("  plants       : {}", snapshot.plant_count);
    println!("  waterings    : {}", snapshot.total_waterings);
    println!("  photos       : {}", stats.photo_count);
    println!("  visit streak : {} days", stats.visit_streak);
    println!("  achievements : {unlocked}/{}", snapshot.achievements.len());
    Ok(())
}

pub(crate) fn run_reminders(garden: &Garden) -> Result<()> {
    let snapshot = garden.coordinator.snapshot();
    let pending = garden.coordinator.pending_reminders()?;
    println!("── pending reminders ────────────────────────────────");
    if pending.is_empty() {
        println!("  (none)");
    }
    for reminder in &pending {
        let name = snapshot
            .plants
            .iter()
            .find(|plant| plant.id == reminder.plant_id)
            .map(|plant| plant.name.as_str())
            .unwrap_or("?");
        println!(
            "  {}  {:<20} {}",
            reminder.fire_at_local.format("%Y-%m-%d %H:%M"),
            name,
            reminder.title
        );
    }
    Ok(())
}

pub(crate) fn run_wipe(garden: &Garden, yes: bool) -> Result<()> {
    let count = garden.coordinator.snapshot().plant_count;
    println!("⚠️  destructive operation: garden wipe");
    println!("- plants: {count}");

    if count == 0 {
        println!("garden is already empty");
        return Ok(());
    }

    if !yes {
        if !io::stdin().is_terminal() {
            bail!("refusing destructive wipe in non-interactive mode without --yes");
        }
        print!("This permanently deletes every plant, journal entry and reminder. Type 'WIPE GARDEN' to continue: ");
        io::stdout().flush()?;
        let mut confirmation = String::new();
        io::stdin().read_line(&mut confirmation)?;
        if confirmation.trim() != "WIPE GARDEN" {
            println!("wipe cancelled");
            return Ok(());
        }
    }

    let removed = garden.coordinator.wipe_all()?;
    println!("garden wipe complete: removed {removed} plants");
    garden.settle()
}

pub(crate) fn run_compact(garden: &Garden) -> Result<()> {
    let kept = garden.store.compact()?;
    println!("journal compacted: {kept} plant records kept");
    if let Some(path) = garden.store.journal_path() {
        println!("- path: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn plants() -> Vec<Plant> {
        ["Fern", "Basil", "basil"]
            .into_iter()
            .map(|name| {
                PlantDraft::new(name, "Testus")
                    .into_plant(Utc::now(), IntervalDays::DEFAULT)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn finds_by_name_case_insensitively() {
        let found = find_plant(plants(), "FERN").unwrap();
        assert_eq!(found.name, "Fern");
    }

    #[test]
    fn finds_by_full_id_and_prefix() {
        let garden = plants();
        let target = garden[0].clone();
        assert_eq!(find_plant(garden.clone(), &target.id.to_string()).unwrap().id, target.id);
        assert_eq!(find_plant(garden, &target.id.short()).unwrap().id, target.id);
    }

    #[test]
    fn ambiguous_or_missing_names_fail() {
        let err = find_plant(plants(), "basil").unwrap_err();
        assert!(err.to_string().contains("several plants"));
        assert!(find_plant(plants(), "Cactus").is_err());
    }

    #[test]
    fn entry_kinds_parse_from_slugs() {
        assert_eq!(parse_kind("water").unwrap(), CareEventKind::Watered);
        assert_eq!(parse_kind("Health Check").unwrap(), CareEventKind::HealthCheck);
        assert!(parse_kind("prune").is_err());
    }
}
