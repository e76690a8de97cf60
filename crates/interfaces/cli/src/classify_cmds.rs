use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use verdant_classifier::{ClassifierError, GeminiClassifier, GeminiSettings, PlantClassifier};
use verdant_config::AppConfig;
use verdant_garden::{CareEventKind, CareGuide, JournalDraft, PlantDraft};

use crate::garden_cmds::{Garden, announce_unlocks};

fn build_classifier(config: &AppConfig) -> Result<Box<dyn PlantClassifier>> {
    if !config.has_classifier_key() {
        bail!("no classifier API key configured — set GEMINI_API_KEY or [classifier].api_key");
    }
    let classifier = GeminiClassifier::new(GeminiSettings {
        api_key: Some(config.classifier.api_key.clone()),
        model: config.classifier.model.clone(),
        base_url: config.classifier.base_url.clone(),
        timeout: Duration::from_secs(config.classifier.timeout_secs.max(1)),
    })?;
    Ok(Box::new(classifier))
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {}", path.display()))
}

pub(crate) async fn run_identify(
    config: &AppConfig,
    garden: &Garden,
    image: &Path,
    add_as: Option<String>,
) -> Result<()> {
    let classifier = build_classifier(config)?;
    let bytes = read_image(image).await?;

    let identification = match classifier.identify(&bytes).await {
        Ok(identification) => identification,
        Err(ClassifierError::NotAPlant) => {
            println!("that photo doesn't look like a plant — try another angle or better light");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("── identification ───────────────────────────────────");
    println!("  species     : {}", identification.species_name);
    println!("  common name : {}", identification.common_name);
    println!("  watering    : {}", identification.care_guide.watering);
    println!("  light       : {}", identification.care_guide.light);
    println!("  temperature : {}", identification.care_guide.temperature);

    let Some(name) = add_as else {
        return Ok(());
    };
    let guide = identification.care_guide;
    let plant = garden.coordinator.add_plant(PlantDraft {
        name,
        species: identification.species_name,
        image: Some(image.display().to_string()),
        care_guide: Some(CareGuide {
            watering: guide.watering,
            light: guide.light,
            temperature: guide.temperature,
        }),
        watering_interval_days: None,
    })?;
    println!();
    println!("added {} ({}) to the garden", plant.name, plant.id.short());
    garden.settle()
}

pub(crate) async fn run_diagnose(
    config: &AppConfig,
    garden: &Garden,
    image: &Path,
    plant: Option<&str>,
) -> Result<()> {
    // Resolve before calling out so a typo doesn't waste a request.
    let target = plant.map(|query| garden.find(query)).transpose()?;
    let classifier = build_classifier(config)?;
    let bytes = read_image(image).await?;
    let diagnosis = classifier.diagnose(&bytes).await?;

    println!("── diagnosis ────────────────────────────────────────");
    println!("  condition   : {}", diagnosis.condition);
    println!("  description : {}", diagnosis.description);
    if !diagnosis.potential_causes.is_empty() {
        println!("  causes:");
        for cause in &diagnosis.potential_causes {
            println!("    - {cause}");
        }
    }
    if !diagnosis.treatment_steps.is_empty() {
        println!("  treatment:");
        for step in &diagnosis.treatment_steps {
            println!("    {}. {}", step.step, step.instruction);
        }
    }

    if garden.coordinator.record_diagnosis_performed()? {
        announce_unlocks(&garden.coordinator.snapshot());
    }

    if let Some(target) = target {
        let entry = JournalDraft {
            kind: CareEventKind::HealthCheck,
            note: Some(format!("{}: {}", diagnosis.condition, diagnosis.description)),
            image: Some(image.display().to_string()),
        };
        garden.coordinator.log_entry(target.id, entry)?;
        println!();
        println!("health check recorded in {}'s journal", target.name);
    }
    garden.settle()
}
