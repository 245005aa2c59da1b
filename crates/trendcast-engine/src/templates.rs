//! Template resolution: which deterministic template renders each slide and
//! whether the slide also receives an AI image.

use trendcast_contracts::brand::StyleGuide;
use trendcast_contracts::content::{ContentFormat, Slide, SlideRole, VisualMode};
use trendcast_contracts::templates::{ids, TemplateSet, CONTENT_ROLE_KEY};

/// What the image synthesizer does for a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePolicy {
    /// Deterministic render only.
    None,
    /// Text-free background composited behind the template layers.
    Background,
    /// Unconstrained full-slide image.
    FullSlide,
}

impl ImagePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Background => "background",
            Self::FullSlide => "full_slide",
        }
    }

    pub fn wants_image(self) -> bool {
        self != Self::None
    }
}

impl From<VisualMode> for ImagePolicy {
    fn from(mode: VisualMode) -> Self {
        match mode {
            VisualMode::BrandStrict => Self::None,
            VisualMode::BrandGuided => Self::Background,
            VisualMode::Free => Self::FullSlide,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidePlan {
    pub index: usize,
    pub role: SlideRole,
    pub template: String,
    pub image: ImagePolicy,
}

/// Built-in role table used when neither the template set nor the style
/// guide names a template.
pub fn default_template_for(role: SlideRole) -> &'static str {
    match role {
        SlideRole::Cover => ids::COVER_CURVE,
        SlideRole::Context => ids::TEXT_CARD,
        SlideRole::Insight => ids::QUOTE_CARD,
        SlideRole::Bullets => ids::BULLET_CARD,
        SlideRole::Closing => ids::CLOSING_CARD,
        SlideRole::Cta => ids::CTA_CARD,
    }
}

/// Resolves templates for one content item. Pure: the same inputs always
/// yield the same plan.
#[derive(Debug, Clone, Copy)]
pub struct TemplateResolver<'a> {
    pub mode: VisualMode,
    pub format: ContentFormat,
    pub style_guide: Option<&'a StyleGuide>,
    pub template_set: Option<&'a TemplateSet>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(mode: VisualMode, format: ContentFormat) -> Self {
        Self {
            mode,
            format,
            style_guide: None,
            template_set: None,
        }
    }

    pub fn with_style_guide(mut self, style_guide: Option<&'a StyleGuide>) -> Self {
        self.style_guide = style_guide;
        self
    }

    pub fn with_template_set(mut self, template_set: Option<&'a TemplateSet>) -> Self {
        self.template_set = template_set;
        self
    }

    pub fn template_for(&self, role: SlideRole) -> String {
        if self.mode == VisualMode::Free {
            return ids::GENERIC.to_string();
        }
        if let Some(template) = self.template_set.and_then(|set| set.template_for(role)) {
            return template.to_string();
        }
        if let Some(template) = self.style_guide.and_then(|guide| recommended(guide, role)) {
            return template.to_string();
        }
        default_template_for(role).to_string()
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy::from(self.mode)
    }

    /// Role the slide at `index` of `count` renders as.
    ///
    /// The first slide is always the cover and the last one always closes
    /// (an explicit `cta` is kept). Middle slides cannot claim either
    /// position. Pinned roles are left alone.
    pub fn positional_role(&self, slide: &Slide, index: usize, count: usize) -> SlideRole {
        if slide.role_pinned {
            return slide.role;
        }
        if index == 0 {
            return SlideRole::Cover;
        }
        if index + 1 == count {
            return if slide.role == SlideRole::Cta {
                SlideRole::Cta
            } else {
                SlideRole::Closing
            };
        }
        match slide.role {
            SlideRole::Cover => SlideRole::Context,
            SlideRole::Closing | SlideRole::Cta => SlideRole::Insight,
            other => other,
        }
    }

    pub fn plan(&self, slides: &[Slide]) -> Vec<SlidePlan> {
        let count = slides.len();
        slides
            .iter()
            .enumerate()
            .map(|(index, slide)| {
                let role = self.positional_role(slide, index, count);
                SlidePlan {
                    index,
                    role,
                    template: self.template_for(role),
                    image: self.image_policy(),
                }
            })
            .collect()
    }

    /// Writes the plan back into the slides: normalized role and template id.
    pub fn apply(&self, slides: &mut [Slide]) -> Vec<SlidePlan> {
        let plan = self.plan(slides);
        for (slide, entry) in slides.iter_mut().zip(plan.iter()) {
            slide.role = entry.role;
            slide.template = Some(entry.template.clone());
        }
        plan
    }
}

fn recommended(guide: &StyleGuide, role: SlideRole) -> Option<&str> {
    guide.template_for_role(role.as_str()).or_else(|| {
        if role.is_body() {
            guide.template_for_role(CONTENT_ROLE_KEY)
        } else {
            None
        }
    })
}
