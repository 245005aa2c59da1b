//! Deterministic slide rendering.
//!
//! A slide plus brand tokens and a template id produce a [`RenderTree`];
//! the tree is then rasterized to PNG or serialized to SVG. Layouts never
//! call out to the network and never read the clock.

pub mod export;
pub mod layouts;
pub mod raster;
pub mod svg;
pub mod tree;

use std::collections::BTreeMap;
use std::fmt;

use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::{Slide, VisualMode};
use trendcast_contracts::templates::ids;

use crate::templates::default_template_for;
use layouts::{LayoutColors, LayoutContext};
pub use tree::{Color, RenderNode, RenderTree};

pub type LayoutFn = fn(&LayoutContext<'_>) -> RenderTree;

/// Template id to layout function. Unknown ids render with the fallback.
#[derive(Clone)]
pub struct TemplateRegistry {
    layouts: BTreeMap<String, LayoutFn>,
    fallback: String,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            layouts: BTreeMap::new(),
            fallback: ids::DEFAULT.to_string(),
        };
        registry.register(ids::COVER_CURVE, layouts::cover_curve);
        registry.register(ids::TEXT_CARD, layouts::text_card);
        registry.register(ids::BULLET_CARD, layouts::bullet_card);
        registry.register(ids::QUOTE_CARD, layouts::quote_card);
        registry.register(ids::CLOSING_CARD, layouts::closing_card);
        registry.register(ids::CTA_CARD, layouts::cta_card);
        registry.register(ids::GENERIC, layouts::generic);
        registry
    }

    pub fn register(&mut self, id: &str, layout: LayoutFn) {
        self.layouts.insert(id.to_string(), layout);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.layouts.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    /// The id actually rendered for `requested`.
    pub fn resolve<'a>(&'a self, requested: &'a str) -> &'a str {
        if self.contains(requested) {
            requested
        } else {
            &self.fallback
        }
    }

    pub fn render(
        &self,
        slide: &Slide,
        tokens: &BrandTokens,
        template_id: &str,
        (width, height): (u32, u32),
    ) -> RenderTree {
        let resolved = self.resolve(template_id);
        if resolved != template_id {
            tracing::debug!(requested = template_id, resolved, "unknown template id");
        }
        let ctx = LayoutContext {
            slide,
            tokens,
            colors: LayoutColors::from_tokens(tokens),
            width,
            height,
        };
        let mut tree = match self.layouts.get(resolved) {
            Some(layout) => layout(&ctx),
            None => layouts::text_card(&ctx),
        };
        tree.heading_font = tokens.fonts.headings.clone();
        tree.body_font = tokens.fonts.body.clone();
        tree
    }
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("layouts", &self.layouts.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Template stored on the slide, or the role default for the content's
/// visual mode.
pub fn template_for_slide(slide: &Slide, mode: VisualMode) -> String {
    if let Some(template) = slide
        .template
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return template.to_string();
    }
    match mode {
        VisualMode::Free => ids::GENERIC.to_string(),
        _ => default_template_for(slide.role).to_string(),
    }
}

pub fn render_slide(
    slide: &Slide,
    tokens: &BrandTokens,
    template_id: &str,
    dimensions: (u32, u32),
) -> RenderTree {
    TemplateRegistry::builtin().render(slide, tokens, template_id, dimensions)
}

#[cfg(test)]
mod tests {
    use trendcast_contracts::brand::{BrandTokens, PaletteColor};
    use trendcast_contracts::content::{Slide, SlideRole, VisualMode};
    use trendcast_contracts::templates::ids;

    use super::{render_slide, template_for_slide, RenderNode, TemplateRegistry};

    fn tokens() -> BrandTokens {
        let mut tokens = BrandTokens::unbranded();
        tokens.palette = [("Paper", "#FAFAF5"), ("Ink", "#202124"), ("Signal", "#FF5A1F")]
            .into_iter()
            .map(|(name, hex)| PaletteColor {
                name: name.to_string(),
                hex: hex.to_string(),
                role: None,
            })
            .collect();
        tokens.logo_url = Some("https://cdn.example.com/logo.png".to_string());
        tokens
    }

    #[test]
    fn identical_inputs_render_identical_trees() {
        let slide = Slide::text(SlideRole::Cover, "Rates fall again", "Central banks cut by 25bp.");
        let tokens = tokens();
        let first = render_slide(&slide, &tokens, ids::COVER_CURVE, (1080, 1350));
        let second = render_slide(&slide, &tokens, ids::COVER_CURVE, (1080, 1350));
        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn unknown_template_renders_as_text_card() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.resolve("neon_poster"), ids::TEXT_CARD);
        let slide = Slide::text(SlideRole::Context, "Why now", "Inflation cooled.");
        let tree = registry.render(&slide, &tokens(), "neon_poster", (1080, 1350));
        assert_eq!(tree.template, ids::TEXT_CARD);
        assert!(tree.texts().any(|line| line.contains("Why now")));
    }

    #[test]
    fn cover_and_text_card_differ_in_structure() {
        let slide = Slide::text(SlideRole::Cover, "Rates fall again", "Body");
        let tokens = tokens();
        let cover = render_slide(&slide, &tokens, ids::COVER_CURVE, (1080, 1350));
        let card = render_slide(&slide, &tokens, ids::TEXT_CARD, (1080, 1350));
        assert!(cover
            .nodes
            .iter()
            .any(|node| matches!(node, RenderNode::Curve { .. })));
        assert!(!card
            .nodes
            .iter()
            .any(|node| matches!(node, RenderNode::Curve { .. })));
        assert!(cover
            .image_urls()
            .any(|url| url == "https://cdn.example.com/logo.png"));
        assert_eq!(cover.heading_font, "Inter");
    }

    #[test]
    fn slide_template_wins_over_role_default() {
        let mut slide = Slide::text(SlideRole::Insight, "H", "B");
        assert_eq!(template_for_slide(&slide, VisualMode::BrandStrict), ids::QUOTE_CARD);
        assert_eq!(template_for_slide(&slide, VisualMode::Free), ids::GENERIC);
        slide.template = Some(ids::BULLET_CARD.to_string());
        assert_eq!(template_for_slide(&slide, VisualMode::Free), ids::BULLET_CARD);
    }
}
