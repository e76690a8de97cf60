use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    extract_json, validate_identification, ClassifierError, Diagnosis, Identification,
    PlantClassifier,
};

const IDENTIFY_PROMPT: &str = r#"You are an expert botanist. Identify the plant in this image.
Provide the response strictly in the following JSON format, and nothing else.
If the image is not a plant, provide a JSON with empty strings.

{
  "speciesName": "Scientific Species Name",
  "commonName": "Common Name",
  "careGuide": {
    "watering": "Brief watering instructions, e.g., 'Water every 7-10 days'",
    "light": "Brief light requirements, e.g., 'Bright indirect light'",
    "temperature": "Brief ideal temperature range, e.g., '18-24°C'"
  }
}"#;

const DIAGNOSE_PROMPT: &str = r#"You are an expert plant pathologist. Analyze the plant in this image for any signs of disease, pests, or nutrient deficiencies.
Provide the response strictly in the following JSON format, and nothing else.
If the plant appears healthy, state that in the condition field.

{
  "condition": "Name of the disease or pest, or 'Healthy'",
  "description": "A brief, one-sentence description of the issue.",
  "potentialCauses": [
    "A list of possible causes, e.g., 'Low humidity', 'Overwatering'."
  ],
  "treatmentSteps": [
    { "step": 1, "instruction": "First treatment step." },
    { "step": 2, "instruction": "Second treatment step." },
    { "step": 3, "instruction": "Third treatment step." }
  ]
}"#;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-flash-latest".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// [`PlantClassifier`] backed by the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: reqwest::Client,
    settings: GeminiSettings,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClassifier {
    pub fn new(settings: GeminiSettings) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn generate(&self, prompt: &str, image: &[u8]) -> Result<String, ClassifierError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ClassifierError::MissingApiKey)?;

        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": "image/jpeg",
                            "data": base64::engine::general_purpose::STANDARD.encode(image),
                        }
                    }
                ]
            }]
        });

        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, image_bytes = image.len(), "calling classifier");
        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }
        reply_text(&body)
    }
}

/// The model's reply is the text of the first part of the first candidate.
fn reply_text(body: &str) -> Result<String, ClassifierError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|err| ClassifierError::Parse(err.to_string()))?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| ClassifierError::Parse("response has no candidate text".to_string()))
}

#[async_trait]
impl PlantClassifier for GeminiClassifier {
    async fn identify(&self, image: &[u8]) -> Result<Identification, ClassifierError> {
        let reply = self.generate(IDENTIFY_PROMPT, image).await?;
        validate_identification(extract_json(&reply)?)
    }

    async fn diagnose(&self, image: &[u8]) -> Result<Diagnosis, ClassifierError> {
        let reply = self.generate(DIAGNOSE_PROMPT, image).await?;
        extract_json(&reply)
    }
}
