use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::content::SlideRole;

/// Built-in deterministic template identifiers.
pub mod ids {
    pub const COVER_CURVE: &str = "cover_curve";
    pub const TEXT_CARD: &str = "text_card";
    pub const BULLET_CARD: &str = "bullet_card";
    pub const QUOTE_CARD: &str = "quote_card";
    pub const CLOSING_CARD: &str = "closing_card";
    pub const CTA_CARD: &str = "cta_card";
    pub const GENERIC: &str = "generic";

    /// Substituted whenever a template id has no renderer.
    pub const DEFAULT: &str = TEXT_CARD;
}

/// Key shared by every body role in a template set mapping.
pub const CONTENT_ROLE_KEY: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSetStatus {
    #[default]
    Active,
    Archived,
}

/// A brand-owned, versioned bundle of role → template choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub id: Uuid,
    pub brand_id: Uuid,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub status: TemplateSetStatus,
    #[serde(default)]
    pub templates_by_role: IndexMap<String, String>,
    #[serde(default)]
    pub layout_params: Map<String, Value>,
    #[serde(default)]
    pub formatting_rules: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TemplateSet {
    pub fn new(brand_id: Uuid, category: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            brand_id,
            category,
            version: default_version(),
            status: TemplateSetStatus::Active,
            templates_by_role: IndexMap::new(),
            layout_params: Map::new(),
            formatting_rules: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: &str, template: &str) -> Self {
        self.templates_by_role
            .insert(role.to_string(), template.to_string());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TemplateSetStatus::Active
    }

    /// Mapping lookup for a slide role.
    ///
    /// Body roles fall back to the shared `content` key; `cta` and `closing`
    /// stand in for each other.
    pub fn template_for(&self, role: SlideRole) -> Option<&str> {
        let mut keys = vec![role.as_str()];
        if role.is_body() {
            keys.push(CONTENT_ROLE_KEY);
        }
        match role {
            SlideRole::Cta => keys.push(SlideRole::Closing.as_str()),
            SlideRole::Closing => keys.push(SlideRole::Cta.as_str()),
            _ => {}
        }
        keys.into_iter()
            .find_map(|key| self.templates_by_role.get(key))
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn same_scope(&self, other: &TemplateSet) -> bool {
        self.brand_id == other.brand_id && self.category == other.category
    }
}

fn default_version() -> u32 {
    1
}
