use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Garden ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GardenConfig {
    /// Directory holding the plant journal, the achievement ledger and the
    /// reminder outbox.  Relative paths resolve against the working directory.
    pub data_dir: String,
    /// Watering interval given to newly added plants.
    pub default_watering_interval_days: u32,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            data_dir: ".verdant".to_string(),
            default_watering_interval_days: 7,
        }
    }
}

// ── Reminders ────────────────────────────────────────────────────────────────

/// Local wall-clock time at which watering reminders fire on their due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub hour: u32,
    pub minute: u32,
    /// IANA timezone name (e.g. `"Europe/Berlin"`).  Empty means "use the
    /// system timezone".  Unrecognised names fall back to UTC.
    pub timezone: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            hour: 9,
            minute: 0,
            timezone: String::new(),
        }
    }
}

// ── Classifier ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// API key for the identification/diagnosis service.  Can also be set via
    /// the `GEMINI_API_KEY` env var (env takes precedence).
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-flash-latest".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub garden: GardenConfig,
    pub reminders: ReminderConfig,
    pub classifier: ClassifierConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(key) = env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                config.classifier.api_key = key;
            }
        }

        if let Ok(dir) = env::var("VERDANT_DATA_DIR") {
            if !dir.is_empty() {
                config.garden.data_dir = dir;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.garden.data_dir)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir().join("garden.jsonl")
    }

    pub fn achievements_path(&self) -> PathBuf {
        self.data_dir().join("achievements.json")
    }

    pub fn reminders_path(&self) -> PathBuf {
        self.data_dir().join("reminders.json")
    }

    pub fn has_classifier_key(&self) -> bool {
        !self.classifier.api_key.trim().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
