//! Static care guides: humidity ranges by plant type and light-level
//! classification from a camera brightness reading.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantType {
    Succulent,
    Standard,
    Tropical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HumidityGuide {
    pub range: &'static str,
    pub description: &'static str,
    pub tips: [&'static str; 3],
}

impl PlantType {
    pub const ALL: [PlantType; 3] = [Self::Succulent, Self::Standard, Self::Tropical];

    pub fn label(self) -> &'static str {
        match self {
            Self::Succulent => "Succulents & Cacti",
            Self::Standard => "Standard Houseplants",
            Self::Tropical => "Tropical Plants",
        }
    }

    pub fn humidity(self) -> HumidityGuide {
        match self {
            Self::Succulent => HumidityGuide {
                range: "10-30%",
                description: "These desert plants prefer very dry air. High humidity can cause rot.",
                tips: [
                    "Ensure good air circulation.",
                    "Avoid placing them in bathrooms or kitchens.",
                    "Group them with other succulents.",
                ],
            },
            Self::Standard => HumidityGuide {
                range: "40-60%",
                description: "This is the ideal range for most common houseplants and is similar to average indoor humidity.",
                tips: [
                    "Group plants together to create a microclimate.",
                    "Use a pebble tray with water under the pot.",
                    "Avoid placing near drafts or heating vents.",
                ],
            },
            Self::Tropical => HumidityGuide {
                range: "60-80%+",
                description: "Originating from rainforests, these plants thrive in high humidity.",
                tips: [
                    "Use a humidifier nearby.",
                    "Mist the leaves regularly with a spray bottle.",
                    "Keep them in a well-lit bathroom.",
                ],
            },
        }
    }
}

impl fmt::Display for PlantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PlantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succulent" | "succulents" | "cactus" | "cacti" => Ok(Self::Succulent),
            "standard" | "houseplant" | "houseplants" => Ok(Self::Standard),
            "tropical" => Ok(Self::Tropical),
            other => Err(format!(
                "unknown plant type '{other}' (expected succulent, standard or tropical)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightLevel {
    Low,
    Medium,
    BrightIndirect,
    DirectSun,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightReading {
    pub level: LightLevel,
    /// Raw EXIF brightness value the reading was classified from.
    pub value: f64,
    pub description: &'static str,
    pub recommended_for: &'static str,
}

impl LightLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low Light",
            Self::Medium => "Medium Light",
            Self::BrightIndirect => "Bright, Indirect Light",
            Self::DirectSun => "Direct Sunlight",
        }
    }

    /// Bucket a camera brightness value (EV-like, roughly -10..10).
    pub fn from_brightness(value: f64) -> Self {
        if value < -3.0 {
            Self::Low
        } else if value < 0.0 {
            Self::Medium
        } else if value < 3.0 {
            Self::BrightIndirect
        } else {
            Self::DirectSun
        }
    }

    pub fn reading(value: f64) -> LightReading {
        let level = Self::from_brightness(value);
        let (description, recommended_for) = match level {
            Self::Low => ("Suitable for shade-loving plants.", "ZZ Plant, Snake Plant"),
            Self::Medium => ("Good for most common houseplants.", "Pothos, Philodendron"),
            Self::BrightIndirect => (
                "Ideal for plants needing lots of light but not direct sun.",
                "Fiddle Leaf Fig, Monstera",
            ),
            Self::DirectSun => ("Best for sun-loving plants like succulents.", "Cacti, Aloe Vera"),
        };
        LightReading {
            level,
            value,
            description,
            recommended_for,
        }
    }
}

impl fmt::Display for LightLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
