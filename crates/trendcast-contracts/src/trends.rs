use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scraped news item that content is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Copy style knobs passed to the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub call_to_action: Option<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            language: default_language(),
            audience: None,
            call_to_action: None,
        }
    }
}

fn default_tone() -> String {
    "informative".to_string()
}

fn default_language() -> String {
    "en".to_string()
}
