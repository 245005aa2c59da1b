mod lifecycle;
mod record;
mod slide;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use lifecycle::{ContentStatus, LifecycleError};
pub use record::GeneratedContent;
pub use slide::{Slide, SlideEdit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Post,
    Story,
    Carousel,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 3] = [Self::Post, Self::Story, Self::Carousel];

    /// Fixed slide count for the format.
    pub fn slide_count(self) -> usize {
        match self {
            Self::Carousel => 5,
            Self::Post | Self::Story => 1,
        }
    }

    /// Export dimensions in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Story => (1080, 1920),
            Self::Post | Self::Carousel => (1080, 1350),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Story => "story",
            Self::Carousel => "carousel",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == raw.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown content format '{raw}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualMode {
    BrandStrict,
    BrandGuided,
    #[default]
    Free,
}

impl VisualMode {
    pub const ALL: [VisualMode; 3] = [Self::BrandStrict, Self::BrandGuided, Self::Free];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrandStrict => "brand_strict",
            Self::BrandGuided => "brand_guided",
            Self::Free => "free",
        }
    }

    pub fn is_branded(self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| format!("unknown visual mode '{raw}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideRole {
    Cover,
    Context,
    Insight,
    Bullets,
    Closing,
    Cta,
}

impl SlideRole {
    pub const ALL: [SlideRole; 6] = [
        Self::Cover,
        Self::Context,
        Self::Insight,
        Self::Bullets,
        Self::Closing,
        Self::Cta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Context => "context",
            Self::Insight => "insight",
            Self::Bullets => "bullets",
            Self::Closing => "closing",
            Self::Cta => "cta",
        }
    }

    /// Roles that sit between the cover and the closing slide.
    pub fn is_body(self) -> bool {
        matches!(self, Self::Context | Self::Insight | Self::Bullets)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Cta)
    }

    /// Lenient parse used for collaborator output; unknown roles are `None`.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cover" | "hook" | "title" => Some(Self::Cover),
            "context" | "content" => Some(Self::Context),
            "insight" | "quote" => Some(Self::Insight),
            "bullets" | "list" => Some(Self::Bullets),
            "closing" | "summary" => Some(Self::Closing),
            "cta" | "call_to_action" => Some(Self::Cta),
            _ => None,
        }
    }
}

impl fmt::Display for SlideRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
