use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::ContentFormat;

/// Role key used by style galleries for generic content slides.
pub const GALLERY_CONTENT_ROLE: &str = "content";

/// How far a reference selection had to degrade from the ideal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    ExactCategory,
    CategoryAnyType,
    BrandWide,
    StyleGallery,
    None,
}

impl FallbackLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactCategory => "exact_category",
            Self::CategoryAnyType => "category_any_type",
            Self::BrandWide => "brand_wide",
            Self::StyleGallery => "style_gallery",
            Self::None => "none",
        }
    }

    /// True for every level below an exact category match.
    pub fn is_degraded(self) -> bool {
        !matches!(self, Self::ExactCategory)
    }
}

impl fmt::Display for FallbackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient, ordered set of grounding images for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub urls: Vec<String>,
    #[serde(rename = "fallbackLevel")]
    pub fallback_level: FallbackLevel,
    /// Matches found at the accepted tier before the cap was applied.
    pub matched: usize,
}

impl ReferenceSet {
    pub fn empty() -> Self {
        Self {
            urls: Vec::new(),
            fallback_level: FallbackLevel::None,
            matched: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// A brand-owned example image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandExample {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub image_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub content_type: Option<ContentFormat>,
    pub created_at: DateTime<Utc>,
}

/// System-wide pre-generated references keyed by format, then role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGallery {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub references: BTreeMap<ContentFormat, BTreeMap<String, Vec<String>>>,
}
