use serde::{Deserialize, Serialize};

use super::SlideRole;

/// One visual unit of a content item.
///
/// `image_url` is the single source of truth for the slide image; the
/// legacy `previewImage` key is accepted on input and mirrored on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SlideWire", into = "SlideWire")]
pub struct Slide {
    pub role: SlideRole,
    /// Set when the role was chosen explicitly and must survive positional
    /// normalization.
    pub role_pinned: bool,
    pub template: Option<String>,
    pub headline: String,
    pub body: String,
    pub bullets: Vec<String>,
    pub speaker_notes: Option<String>,
    pub illustration_prompt: Option<String>,
    pub image_url: Option<String>,
    pub image_stale: bool,
}

impl Slide {
    pub fn text(role: SlideRole, headline: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            role,
            role_pinned: false,
            template: None,
            headline: headline.into(),
            body: body.into(),
            bullets: Vec::new(),
            speaker_notes: None,
            illustration_prompt: None,
            image_url: None,
            image_stale: false,
        }
    }

    /// Applies a manual edit. Changing the headline or body while an image
    /// exists marks the image stale; other fields never touch the flag.
    pub fn apply_edit(&mut self, edit: SlideEdit) {
        let mut text_changed = false;
        if let Some(headline) = edit.headline {
            text_changed |= headline != self.headline;
            self.headline = headline;
        }
        if let Some(body) = edit.body {
            text_changed |= body != self.body;
            self.body = body;
        }
        if let Some(bullets) = edit.bullets {
            self.bullets = bullets;
        }
        if let Some(notes) = edit.speaker_notes {
            self.speaker_notes = Some(notes).filter(|value| !value.trim().is_empty());
        }
        if text_changed && self.image_url.is_some() {
            self.image_stale = true;
        }
    }

    /// Stores a freshly generated image; the text now matches it again.
    pub fn set_image(&mut self, url: impl Into<String>) {
        self.image_url = Some(url.into());
        self.image_stale = false;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideEdit {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub bullets: Option<Vec<String>>,
    #[serde(default, alias = "speakerNotes")]
    pub speaker_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SlideWire {
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    role_pinned: bool,
    #[serde(default, alias = "templateHint", skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bullets: Vec<String>,
    #[serde(
        default,
        rename = "speakerNotes",
        alias = "speaker_notes",
        skip_serializing_if = "Option::is_none"
    )]
    speaker_notes: Option<String>,
    #[serde(
        default,
        rename = "illustrationPrompt",
        alias = "illustration_prompt",
        skip_serializing_if = "Option::is_none"
    )]
    illustration_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(
        default,
        rename = "previewImage",
        skip_serializing_if = "Option::is_none"
    )]
    preview_image: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    image_stale: bool,
}

impl From<SlideWire> for Slide {
    fn from(wire: SlideWire) -> Self {
        let image_url = wire
            .image_url
            .or(wire.preview_image)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self {
            role: SlideRole::parse_loose(&wire.role).unwrap_or(SlideRole::Context),
            role_pinned: wire.role_pinned,
            template: wire
                .template
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            headline: wire.headline,
            body: wire.body,
            bullets: wire
                .bullets
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            speaker_notes: wire.speaker_notes.filter(|value| !value.trim().is_empty()),
            illustration_prompt: wire
                .illustration_prompt
                .filter(|value| !value.trim().is_empty()),
            image_stale: wire.image_stale && image_url.is_some(),
            image_url,
        }
    }
}

impl From<Slide> for SlideWire {
    fn from(slide: Slide) -> Self {
        Self {
            role: slide.role.as_str().to_string(),
            role_pinned: slide.role_pinned,
            template: slide.template,
            headline: slide.headline,
            body: slide.body,
            bullets: slide.bullets,
            speaker_notes: slide.speaker_notes,
            illustration_prompt: slide.illustration_prompt,
            preview_image: slide.image_url.clone(),
            image_url: slide.image_url,
            image_stale: slide.image_stale,
        }
    }
}
