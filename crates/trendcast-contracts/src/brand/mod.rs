//! Brand identity as the pipeline consumes it.
//!
//! Stored brands arrive in several historical shapes. [`BrandRecord`] keeps
//! the raw JSON; [`BrandRecord::tokens`] is the single place those shapes are
//! folded into the canonical [`BrandTokens`] snapshot.

mod palette;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use palette::{
    default_palette, is_valid_hex, normalize_palette, PaletteColor, RawPalette, DEFAULT_PALETTE,
};

const DEFAULT_FONT: &str = "Inter";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandFonts {
    pub headings: String,
    pub body: String,
}

impl Default for BrandFonts {
    fn default() -> Self {
        Self {
            headings: DEFAULT_FONT.to_string(),
            body: DEFAULT_FONT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuide {
    #[serde(default)]
    pub recommended_templates: Vec<RecommendedTemplate>,
}

impl StyleGuide {
    /// Accepts the guide as an object, as a JSON-encoded string of that
    /// object, or as a bare list of recommendations.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => {
                let parsed: Value = serde_json::from_str(raw.trim()).ok()?;
                match parsed {
                    Value::String(_) => None,
                    other => Self::from_value(&other),
                }
            }
            Value::Array(items) => Some(Self {
                recommended_templates: items.iter().filter_map(recommendation).collect(),
            }),
            Value::Object(obj) => {
                let items = obj
                    .get("recommended_templates")
                    .or_else(|| obj.get("recommendedTemplates"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Some(Self {
                    recommended_templates: items.iter().filter_map(recommendation).collect(),
                })
            }
            _ => None,
        }
    }

    pub fn template_for_role(&self, role: &str) -> Option<&str> {
        self.recommended_templates
            .iter()
            .find(|item| item.role.as_deref() == Some(role))
            .map(|item| item.template.as_str())
    }
}

fn recommendation(value: &Value) -> Option<RecommendedTemplate> {
    match value {
        Value::String(raw) if !raw.trim().is_empty() => Some(RecommendedTemplate {
            role: None,
            template: raw.trim().to_string(),
        }),
        Value::Object(obj) => {
            let template = obj
                .get("template")
                .or_else(|| obj.get("id"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())?;
            Some(RecommendedTemplate {
                role: obj
                    .get("role")
                    .and_then(Value::as_str)
                    .map(|value| value.trim().to_ascii_lowercase())
                    .filter(|value| !value.is_empty()),
                template: template.to_string(),
            })
        }
        _ => None,
    }
}

/// Immutable identity snapshot handed to prompts and the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandTokens {
    pub name: String,
    #[serde(default)]
    pub palette: Vec<PaletteColor>,
    #[serde(default)]
    pub fonts: BrandFonts,
    #[serde(default)]
    pub visual_tone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub do_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dont_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_guide: Option<StyleGuide>,
}

impl BrandTokens {
    /// Neutral tokens used for free mode, where no brand is selected.
    pub fn unbranded() -> Self {
        Self {
            name: String::new(),
            palette: Vec::new(),
            fonts: BrandFonts::default(),
            visual_tone: String::new(),
            logo_url: None,
            do_rules: Vec::new(),
            dont_rules: Vec::new(),
            style_guide: None,
        }
    }

    /// The stored palette, or the default triad when it is empty.
    pub fn effective_palette(&self) -> Vec<PaletteColor> {
        if self.palette.is_empty() {
            return default_palette();
        }
        self.palette.clone()
    }
}

/// A brand row exactly as the data store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub palette: Value,
    #[serde(default)]
    pub fonts: Value,
    #[serde(default)]
    pub visual_tone: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub do_rules: Value,
    #[serde(default)]
    pub dont_rules: Value,
    #[serde(default)]
    pub style_guide: Value,
}

impl BrandRecord {
    pub fn tokens(&self) -> BrandTokens {
        BrandTokens {
            name: self.name.clone(),
            palette: normalize_palette(&self.palette),
            fonts: fonts_from_value(&self.fonts),
            visual_tone: self
                .visual_tone
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            logo_url: self
                .logo_url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            do_rules: rules_from_value(&self.do_rules),
            dont_rules: rules_from_value(&self.dont_rules),
            style_guide: StyleGuide::from_value(&self.style_guide),
        }
    }
}

fn fonts_from_value(value: &Value) -> BrandFonts {
    let defaults = BrandFonts::default();
    match value {
        Value::String(raw) if !raw.trim().is_empty() => BrandFonts {
            headings: raw.trim().to_string(),
            body: raw.trim().to_string(),
        },
        Value::Object(obj) => {
            let pick = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|key| obj.get(*key).and_then(Value::as_str))
                    .map(str::trim)
                    .find(|value| !value.is_empty())
                    .map(str::to_string)
            };
            let headings = pick(&["headings", "heading", "title"]);
            let body = pick(&["body", "text"]);
            BrandFonts {
                headings: headings
                    .clone()
                    .or_else(|| body.clone())
                    .unwrap_or(defaults.headings),
                body: body.or(headings).unwrap_or(defaults.body),
            }
        }
        _ => defaults,
    }
}

fn rules_from_value(value: &Value) -> Vec<String> {
    let lines: Vec<String> = match value {
        Value::String(raw) => raw.lines().map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    lines
        .into_iter()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
