use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod gemini;

pub use gemini::{GeminiClassifier, GeminiSettings};

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareGuideText {
    pub watering: String,
    pub light: String,
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub species_name: String,
    pub common_name: String,
    #[serde(default)]
    pub care_guide: CareGuideText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentStep {
    pub step: u32,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    /// Disease or pest name, or "Healthy".
    pub condition: String,
    pub description: String,
    #[serde(default)]
    pub potential_causes: Vec<String>,
    #[serde(default)]
    pub treatment_steps: Vec<TreatmentStep>,
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        self.condition.trim().eq_ignore_ascii_case("healthy")
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not parse classifier response: {0}")]
    Parse(String),
    #[error("the image does not look like a plant")]
    NotAPlant,
}

// ── Classifier trait ─────────────────────────────────────────────────────────

/// Image-based plant identification and diagnosis.  `image` is the raw
/// JPEG bytes.
#[async_trait]
pub trait PlantClassifier: Send + Sync {
    async fn identify(&self, image: &[u8]) -> Result<Identification, ClassifierError>;
    async fn diagnose(&self, image: &[u8]) -> Result<Diagnosis, ClassifierError>;
}

// ── Response parsing ─────────────────────────────────────────────────────────

/// Pull the JSON object out of a model reply, tolerating ```json fences and
/// stray prose around the object.
pub fn extract_json<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T, ClassifierError> {
    if let Some(fence_start) = reply.find("```json") {
        let body = &reply[fence_start + "```json".len()..];
        if let Some(fence_end) = body.find("```") {
            if let Ok(value) = serde_json::from_str(body[..fence_end].trim()) {
                return Ok(value);
            }
        }
    }

    let trimmed = reply.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end])
            .map_err(|err| ClassifierError::Parse(err.to_string())),
        _ => Err(ClassifierError::Parse(format!(
            "no JSON object in reply: {}",
            truncate(trimmed, 120)
        ))),
    }
}

/// An identification with no species name is the model's way of saying the
/// picture is not a plant.
pub fn validate_identification(identification: Identification) -> Result<Identification, ClassifierError> {
    if identification.species_name.trim().is_empty() {
        return Err(ClassifierError::NotAPlant);
    }
    Ok(identification)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
