//! Copy generation through the text-generation collaborator.

use serde::Deserialize;
use serde_json::Value;
use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::{ContentFormat, Slide, VisualMode};
use trendcast_contracts::trends::{StyleConfig, Trend};

use crate::error::{PipelineError, PipelineResult};
use crate::providers::{TextGenerationClient, TextGenerationRequest, TEXT_COLLABORATOR};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    pub trend: &'a Trend,
    pub style: &'a StyleConfig,
    pub format: ContentFormat,
    pub mode: VisualMode,
    pub brand: Option<&'a BrandTokens>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCopy {
    pub title: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Deserialize)]
struct CopyWire {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    hashtags: Value,
    #[serde(default)]
    slides: Vec<Slide>,
}

pub struct CopyGenerator<'a> {
    client: &'a dyn TextGenerationClient,
    model: String,
    retry: RetryPolicy,
}

impl<'a> CopyGenerator<'a> {
    pub fn new(client: &'a dyn TextGenerationClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Transport failures are retried; malformed output is not.
    pub fn generate(&self, request: &CopyRequest<'_>) -> PipelineResult<GeneratedCopy> {
        let text_request = TextGenerationRequest {
            model: self.model.clone(),
            system: system_prompt(request),
            user: user_prompt(request),
            expected_slides: request.format.slide_count(),
        };
        let attempted = self
            .retry
            .run("copy", |_| self.client.complete(&text_request))?;
        let copy = parse_copy(&attempted.value, request.format, &request.trend.title)?;
        tracing::info!(
            client = self.client.name(),
            model = %self.model,
            slides = copy.slides.len(),
            hashtags = copy.hashtags.len(),
            "copy generated"
        );
        Ok(copy)
    }
}

pub fn system_prompt(request: &CopyRequest<'_>) -> String {
    let count = request.format.slide_count();
    let mut lines = vec![
        format!(
            "You write social media {} copy in {}. Tone: {}.",
            request.format, request.style.language, request.style.tone
        ),
        format!(
            "Reply with one JSON object: {{\"title\", \"caption\", \"hashtags\": [..], \"slides\": [..]}} with exactly {count} slide(s)."
        ),
        "Each slide has \"role\" (cover, context, insight, bullets, closing or cta), \"template\", \"headline\", \"body\", optional \"bullets\" and \"speakerNotes\", and \"illustrationPrompt\".".to_string(),
        "\"illustrationPrompt\" describes only the visual scene; it never asks for text, letters, captions or logos in the image.".to_string(),
    ];
    if count > 1 {
        lines.push("The first slide is the cover and the last one closes with a takeaway or call to action.".to_string());
    }
    if let Some(audience) = request.style.audience.as_deref() {
        lines.push(format!("Audience: {audience}."));
    }
    if let Some(brand) = request.brand.filter(|_| request.mode.is_branded()) {
        if !brand.name.is_empty() {
            lines.push(format!("Write as the brand \"{}\".", brand.name));
        }
        if !brand.visual_tone.is_empty() {
            lines.push(format!("Brand tone: {}.", brand.visual_tone));
        }
        if !brand.do_rules.is_empty() {
            lines.push(format!("Always: {}.", brand.do_rules.join("; ")));
        }
        if !brand.dont_rules.is_empty() {
            lines.push(format!("Never: {}.", brand.dont_rules.join("; ")));
        }
    }
    lines.join("\n")
}

pub fn user_prompt(request: &CopyRequest<'_>) -> String {
    let trend = request.trend;
    let mut lines = vec![format!("Trend: {}", trend.title.trim())];
    if !trend.summary.trim().is_empty() {
        lines.push(format!("Summary: {}", trend.summary.trim()));
    }
    if let Some(source) = trend.source.as_deref() {
        lines.push(format!("Source: {source}"));
    }
    if let Some(url) = trend.url.as_deref() {
        lines.push(format!("Link: {url}"));
    }
    if let Some(cta) = request.style.call_to_action.as_deref() {
        lines.push(format!("Call to action: {cta}"));
    }
    lines.join("\n")
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses collaborator output into copy with exactly the format's slide
/// count. Extra slides are dropped; missing ones are an error.
pub fn parse_copy(
    raw: &str,
    format: ContentFormat,
    fallback_title: &str,
) -> PipelineResult<GeneratedCopy> {
    let json = extract_json_object(raw).ok_or_else(|| parse_error("no JSON object in response"))?;
    let wire: CopyWire = serde_json::from_str(json)
        .map_err(|err| parse_error(&format!("invalid copy JSON: {err}")))?;

    let expected = format.slide_count();
    if wire.slides.len() < expected {
        return Err(parse_error(&format!(
            "expected {expected} slide(s) for {format}, got {}",
            wire.slides.len()
        )));
    }
    let slides: Vec<Slide> = wire
        .slides
        .into_iter()
        .take(expected)
        .map(|mut slide| {
            slide.role_pinned = false;
            slide.image_url = None;
            slide.image_stale = false;
            slide
        })
        .collect();

    let title = wire
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback_title.trim().to_string());
    Ok(GeneratedCopy {
        title,
        caption: wire.caption.unwrap_or_default().trim().to_string(),
        hashtags: normalize_hashtags(&wire.hashtags),
        slides,
    })
}

/// Accepts a list or a whitespace/comma separated string. Every tag gets a
/// single leading `#`; duplicates (case-insensitive) keep the first spelling.
pub fn normalize_hashtags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(text) => text
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for tag in raw {
        let body: String = tag
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        if body.is_empty() {
            continue;
        }
        let key = body.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(format!("#{body}"));
    }
    out
}

fn parse_error(message: &str) -> PipelineError {
    PipelineError::Parse {
        collaborator: TEXT_COLLABORATOR,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trendcast_contracts::brand::BrandTokens;
    use trendcast_contracts::content::{ContentFormat, SlideRole, VisualMode};
    use trendcast_contracts::trends::{StyleConfig, Trend};
    use uuid::Uuid;

    use super::{
        normalize_hashtags, parse_copy, system_prompt, CopyGenerator, CopyRequest,
    };
    use crate::error::PipelineError;
    use crate::providers::DryrunTextClient;
    use crate::retry::RetryPolicy;

    fn trend() -> Trend {
        Trend {
            id: Uuid::new_v4(),
            title: "Rates fall again".to_string(),
            summary: "Central banks cut by 25bp.".to_string(),
            source: Some("Wire".to_string()),
            url: None,
            category: Some("finance".to_string()),
            published_at: None,
        }
    }

    #[test]
    fn json_is_extracted_from_surrounding_chatter() -> anyhow::Result<()> {
        let raw = r##"Sure! {"title": "T", "caption": "C", "hashtags": "#a, b #A",
            "slides": [{"role": "hook", "headline": "H", "body": "B", "templateHint": "cover_curve", "image_url": "x"}]} thanks"##;
        let copy = parse_copy(raw, ContentFormat::Post, "fallback")?;
        assert_eq!(copy.title, "T");
        assert_eq!(copy.hashtags, vec!["#a", "#b"]);
        assert_eq!(copy.slides.len(), 1);
        assert_eq!(copy.slides[0].role, SlideRole::Cover);
        assert_eq!(copy.slides[0].template.as_deref(), Some("cover_curve"));
        assert!(copy.slides[0].image_url.is_none());
        Ok(())
    }

    #[test]
    fn extra_slides_are_truncated_and_missing_ones_rejected() -> anyhow::Result<()> {
        let slide = json!({"role": "context", "headline": "H", "body": "B"});
        let six = json!({"title": "T", "slides": vec![slide.clone(); 6]}).to_string();
        assert_eq!(parse_copy(&six, ContentFormat::Carousel, "f")?.slides.len(), 5);

        let four = json!({"title": "T", "slides": vec![slide; 4]}).to_string();
        assert!(matches!(
            parse_copy(&four, ContentFormat::Carousel, "f"),
            Err(PipelineError::Parse { .. })
        ));
        assert!(matches!(
            parse_copy("no json here", ContentFormat::Post, "f"),
            Err(PipelineError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_title_uses_trend_title() -> anyhow::Result<()> {
        let raw = json!({"slides": [{"headline": "H", "body": "B"}]}).to_string();
        assert_eq!(parse_copy(&raw, ContentFormat::Story, "Rates fall")?.title, "Rates fall");
        Ok(())
    }

    #[test]
    fn hashtags_are_prefixed_and_deduplicated() {
        let tags = normalize_hashtags(&json!(["news", "#News", " ##ai ", "", "Deep Tech"]));
        assert_eq!(tags, vec!["#news", "#ai", "#DeepTech"]);
    }

    #[test]
    fn brand_rules_only_reach_branded_prompts() {
        let trend = trend();
        let style = StyleConfig::default();
        let mut brand = BrandTokens::unbranded();
        brand.name = "Harbor".to_string();
        brand.dont_rules = vec!["slang".to_string()];
        let mut request = CopyRequest {
            trend: &trend,
            style: &style,
            format: ContentFormat::Carousel,
            mode: VisualMode::BrandGuided,
            brand: Some(&brand),
        };
        let prompt = system_prompt(&request);
        assert!(prompt.contains("exactly 5 slide(s)"));
        assert!(prompt.contains("Never: slang."));

        request.mode = VisualMode::Free;
        assert!(!system_prompt(&request).contains("Harbor"));
    }

    #[test]
    fn dryrun_copy_round_trips_through_generator() -> anyhow::Result<()> {
        let trend = trend();
        let style = StyleConfig::default();
        let client = DryrunTextClient;
        let generator =
            CopyGenerator::new(&client, "dryrun-text").with_retry(RetryPolicy::immediate());
        let copy = generator.generate(&CopyRequest {
            trend: &trend,
            style: &style,
            format: ContentFormat::Carousel,
            mode: VisualMode::Free,
            brand: None,
        })?;
        assert_eq!(copy.slides.len(), 5);
        assert_eq!(copy.hashtags, vec!["#trendcast", "#draft"]);
        assert_eq!(copy.slides[4].role, SlideRole::Closing);
        Ok(())
    }
}
