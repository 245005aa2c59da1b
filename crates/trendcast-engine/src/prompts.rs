//! Image prompt construction.
//!
//! Brand-guided and style-gallery prompts ask for a text-free background
//! with calm safe areas for the overlay; free prompts only carry a quality
//! hint.

use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::{ContentFormat, Slide, SlideRole};

use crate::templates::ImagePolicy;

const TEXT_REQUEST_WORDS: [&str; 16] = [
    "text",
    "texts",
    "caption",
    "captions",
    "headline",
    "title",
    "titles",
    "word",
    "words",
    "letter",
    "letters",
    "lettering",
    "typography",
    "font",
    "written",
    "says",
];

const FREE_QUALITY_HINT: &str =
    "High quality, modern editorial look, strong composition, suitable for social media.";

#[derive(Debug, Clone, Copy)]
pub struct SafeArea {
    pub top: u32,
    pub bottom: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ImagePromptInput<'a> {
    pub policy: ImagePolicy,
    pub format: ContentFormat,
    pub role: SlideRole,
    pub slide: &'a Slide,
    pub brand: Option<&'a BrandTokens>,
    pub safe_area: SafeArea,
    pub reference_count: usize,
}

pub fn aspect_ratio(format: ContentFormat) -> &'static str {
    match format {
        ContentFormat::Story => "9:16",
        ContentFormat::Post | ContentFormat::Carousel => "4:5",
    }
}

pub fn build_image_prompt(input: &ImagePromptInput<'_>) -> String {
    match input.policy {
        ImagePolicy::FullSlide => free_prompt(input),
        ImagePolicy::Background | ImagePolicy::None => background_prompt(input),
    }
}

fn subject(slide: &Slide) -> String {
    let scrubbed = slide
        .illustration_prompt
        .as_deref()
        .map(scrub_text_requests)
        .unwrap_or_default();
    if !scrubbed.is_empty() {
        return scrubbed;
    }
    let theme = slide.headline.trim();
    if theme.is_empty() {
        "an abstract composition".to_string()
    } else {
        format!("an abstract visual metaphor for the theme \"{theme}\"")
    }
}

fn background_prompt(input: &ImagePromptInput<'_>) -> String {
    let (width, height) = input.format.dimensions();
    let mut lines = vec![
        format!(
            "Create a background image for the {} slide of a {} ({width}x{height}, aspect {}).",
            input.role,
            input.format,
            aspect_ratio(input.format)
        ),
        format!("Subject: {}.", subject(input.slide).trim_end_matches('.')),
        "Zero rendered text: no letters, words, numbers, logos, signage or watermarks anywhere in the image.".to_string(),
        format!(
            "Leave the top {}px and bottom {}px as calm, low-detail safe areas; text and logo are overlaid there later.",
            input.safe_area.top, input.safe_area.bottom
        ),
    ];

    if let Some(brand) = input.brand {
        let palette = brand
            .effective_palette()
            .iter()
            .map(|color| format!("{} {}", color.name, color.hex))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Use the brand palette: {palette}."));
        if !brand.visual_tone.trim().is_empty() {
            lines.push(format!("Visual tone: {}.", brand.visual_tone.trim()));
        }
        if !brand.do_rules.is_empty() {
            lines.push(format!("Do: {}.", brand.do_rules.join("; ")));
        }
        if !brand.dont_rules.is_empty() {
            lines.push(format!("Avoid: {}.", brand.dont_rules.join("; ")));
        }
    }
    if input.reference_count > 0 {
        lines.push(format!(
            "Match the style, lighting and composition of the {} reference image(s); do not copy any text from them.",
            input.reference_count
        ));
    }
    lines.join("\n")
}

fn free_prompt(input: &ImagePromptInput<'_>) -> String {
    let mut lines = vec![format!(
        "Create a {} social media image (aspect {}).",
        input.format,
        aspect_ratio(input.format)
    )];
    let headline = input.slide.headline.trim();
    if !headline.is_empty() {
        lines.push(format!("Topic: {headline}."));
    }
    let body = input.slide.body.trim();
    if !body.is_empty() {
        lines.push(format!("Context: {body}"));
    }
    let illustration = input
        .slide
        .illustration_prompt
        .as_deref()
        .map(scrub_text_requests)
        .unwrap_or_default();
    if !illustration.is_empty() {
        lines.push(format!("Visual idea: {illustration}."));
    }
    lines.push(FREE_QUALITY_HINT.to_string());
    lines.join("\n")
}

/// Drops every sentence or clause of `prompt` that asks for text in the
/// image. The remaining clauses keep their order.
pub fn scrub_text_requests(prompt: &str) -> String {
    prompt
        .split(['.', ';', '\n'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .filter(|clause| !requests_text(clause))
        .collect::<Vec<_>>()
        .join(". ")
}

fn requests_text(clause: &str) -> bool {
    if clause.contains('"') {
        return true;
    }
    clause
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| {
            let lowered = word.to_ascii_lowercase();
            TEXT_REQUEST_WORDS.contains(&lowered.as_str())
        })
}

#[cfg(test)]
mod tests {
    use trendcast_contracts::brand::BrandTokens;
    use trendcast_contracts::content::{ContentFormat, Slide, SlideRole};

    use super::{build_image_prompt, scrub_text_requests, ImagePromptInput, SafeArea};
    use crate::templates::ImagePolicy;

    fn input<'a>(
        policy: ImagePolicy,
        slide: &'a Slide,
        brand: Option<&'a BrandTokens>,
    ) -> ImagePromptInput<'a> {
        ImagePromptInput {
            policy,
            format: ContentFormat::Carousel,
            role: SlideRole::Cover,
            slide,
            brand,
            safe_area: SafeArea {
                top: 220,
                bottom: 260,
            },
            reference_count: 3,
        }
    }

    #[test]
    fn scrubbing_removes_text_requests_only() {
        let scrubbed = scrub_text_requests(
            "A misty harbor at dawn; add the headline in bold letters. Soft pastel light\nA sign that says \"OPEN\"",
        );
        assert_eq!(scrubbed, "A misty harbor at dawn. Soft pastel light");
        assert_eq!(scrub_text_requests("Typography poster"), "");
    }

    #[test]
    fn guided_prompt_demands_no_text_and_safe_areas() {
        let mut slide = Slide::text(SlideRole::Cover, "Rates fall again", "Body");
        slide.illustration_prompt = Some("Stacked coins under morning light. Title on top".into());
        let mut brand = BrandTokens::unbranded();
        brand.visual_tone = "calm, premium".to_string();
        brand.dont_rules = vec!["neon colors".to_string()];

        let prompt = build_image_prompt(&input(ImagePolicy::Background, &slide, Some(&brand)));
        assert!(prompt.contains("Zero rendered text"));
        assert!(prompt.contains("top 220px and bottom 260px"));
        assert!(prompt.contains("Stacked coins under morning light"));
        assert!(!prompt.contains("Title on top"));
        assert!(prompt.contains("Visual tone: calm, premium."));
        assert!(prompt.contains("Avoid: neon colors."));
        assert!(prompt.contains("#F7F4EF"));
    }

    #[test]
    fn free_prompt_is_unconstrained() {
        let slide = Slide::text(SlideRole::Context, "Rates fall again", "Central banks cut.");
        let prompt = build_image_prompt(&input(ImagePolicy::FullSlide, &slide, None));
        assert!(prompt.contains("Topic: Rates fall again."));
        assert!(prompt.contains("High quality"));
        assert!(!prompt.contains("Zero rendered text"));
        assert!(!prompt.contains("safe areas"));
    }

    #[test]
    fn free_prompt_drops_lettering_from_the_visual_idea() {
        let mut slide = Slide::text(SlideRole::Context, "Rates fall again", "Central banks cut.");
        slide.illustration_prompt = Some(
            "Harbor at dawn. A banner with the words \"RATES FALL\" in bold letters".into(),
        );
        let prompt = build_image_prompt(&input(ImagePolicy::FullSlide, &slide, None));
        assert!(prompt.contains("Visual idea: Harbor at dawn."));
        assert!(!prompt.contains("RATES FALL"));
        assert!(!prompt.contains("banner"));

        slide.illustration_prompt = Some("Typography poster".into());
        let prompt = build_image_prompt(&input(ImagePolicy::FullSlide, &slide, None));
        assert!(!prompt.contains("Visual idea"));
    }
}
