//! Request-level orchestration: copy, template resolution, references,
//! synthesis and persistence, plus the JSON envelopes handed back to UI
//! callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use trendcast_contracts::brand::BrandTokens;
use trendcast_contracts::content::{
    ContentFormat, ContentStatus, GeneratedContent, SlideEdit, VisualMode,
};
use trendcast_contracts::events::EventLog;
use trendcast_contracts::models::{
    ModelCapability, ModelRegistry, ModelSelector, ModelSpec, DRYRUN_GATEWAY,
};
use trendcast_contracts::references::ReferenceSet;
use trendcast_contracts::runs::receipts::GenerationDebug;
use trendcast_contracts::runs::summary::{write_summary, BatchSummary};
use trendcast_contracts::templates::TemplateSet;
use trendcast_contracts::trends::StyleConfig;
use uuid::Uuid;

use crate::config::{EngineConfig, MAX_REFERENCES_CEILING};
use crate::copy::{CopyGenerator, CopyRequest};
use crate::error::{PipelineError, PipelineResult};
use crate::prompts::{aspect_ratio, build_image_prompt, ImagePromptInput, SafeArea};
use crate::providers::{
    DryrunImageClient, DryrunTextClient, ImageGenerationClient, OpenRouterImageClient,
    OpenRouterTextClient, TextGenerationClient,
};
use crate::references::{ReferenceRequest, ReferenceSelector};
use crate::storage::{build_storage, ObjectStorage};
use crate::store::DataStore;
use crate::synth::{ImageSynthesizer, SynthesisOutcome, SynthesisRequest};
use crate::templates::{ImagePolicy, TemplateResolver};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub trend_id: Uuid,
    #[serde(default)]
    pub style: StyleConfig,
    pub content_type: ContentFormat,
    #[serde(default)]
    pub visual_mode: VisualMode,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    /// Overrides the trend's own category for template and reference
    /// lookups.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub style_gallery_id: Option<Uuid>,
    #[serde(default)]
    pub text_model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    /// Replaces the gallery stored on the content, if any.
    #[serde(default)]
    pub style_gallery_id: Option<Uuid>,
    #[serde(default)]
    pub image_model: Option<String>,
}

/// Whether the image is the whole slide or a background behind the
/// deterministic text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Slide,
    Background,
}

impl ImageKind {
    pub fn response_key(self) -> &'static str {
        match self {
            Self::Slide => "imageUrl",
            Self::Background => "backgroundImageUrl",
        }
    }

    fn policy(self, mode: VisualMode) -> ImagePolicy {
        match (self, ImagePolicy::from(mode)) {
            (_, ImagePolicy::None) => ImagePolicy::None,
            (Self::Background, _) => ImagePolicy::Background,
            (Self::Slide, policy) => policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideImageResult {
    pub kind: ImageKind,
    pub slide_index: usize,
    pub image_url: String,
    pub debug: GenerationDebug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideImageState {
    Generated,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideImageStatus {
    pub slide_index: usize,
    pub state: SlideImageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub content: GeneratedContent,
    pub summary: BatchSummary,
    pub slides: Vec<SlideImageStatus>,
}

/// HTTP-like status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResponse {
    pub status: u16,
    pub body: Value,
}

impl PipelineResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(err: &PipelineError) -> Self {
        Self {
            status: err.http_status(),
            body: json!({
                "success": false,
                "error": err.to_string(),
                "category": err.category(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

pub fn content_response(result: &PipelineResult<GeneratedContent>) -> PipelineResponse {
    match result {
        Ok(content) => PipelineResponse::ok(json!({
            "success": true,
            "content": {
                "id": content.id,
                "title": content.title,
                "caption": content.caption,
                "hashtags": content.hashtags,
                "slides": content.slides,
                "contentType": content.content_type,
                "status": content.status,
                "visualMode": content.visual_mode,
                "brandSnapshot": content.brand_snapshot,
            }
        })),
        Err(err) => PipelineResponse::from_error(err),
    }
}

pub fn slide_image_response(result: &PipelineResult<SlideImageResult>) -> PipelineResponse {
    match result {
        Ok(image) => {
            let mut body = Map::new();
            body.insert("success".to_string(), Value::Bool(true));
            body.insert("slideIndex".to_string(), Value::from(image.slide_index));
            body.insert(
                image.kind.response_key().to_string(),
                Value::String(image.image_url.clone()),
            );
            body.insert(
                "debug".to_string(),
                serde_json::to_value(&image.debug).unwrap_or(Value::Null),
            );
            PipelineResponse::ok(Value::Object(body))
        }
        Err(err) => PipelineResponse::from_error(err),
    }
}

/// One pipeline per caller; nothing is shared across instances except the
/// data store they point at.
pub struct Pipeline {
    config: EngineConfig,
    store: Box<dyn DataStore>,
    image_client: Box<dyn ImageGenerationClient>,
    text_client: Box<dyn TextGenerationClient>,
    storage: Box<dyn ObjectStorage>,
    events: EventLog,
    model_selector: ModelSelector,
}

impl Pipeline {
    pub fn new(
        config: EngineConfig,
        store: Box<dyn DataStore>,
        image_client: Box<dyn ImageGenerationClient>,
        text_client: Box<dyn TextGenerationClient>,
        storage: Box<dyn ObjectStorage>,
    ) -> Self {
        Self {
            config,
            store,
            image_client,
            text_client,
            storage,
            events: EventLog::disabled(),
            model_selector: ModelSelector::new(None),
        }
    }

    /// Wires the configured collaborators. Live clients need an API key;
    /// dryrun clients produce placeholder copy and images offline and only
    /// the dryrun registry entries are selectable.
    pub fn from_config(
        config: EngineConfig,
        store: Box<dyn DataStore>,
        dryrun: bool,
    ) -> PipelineResult<Self> {
        let storage = build_storage(&config.storage, config.request_timeout);
        if dryrun {
            let selector =
                ModelSelector::new(Some(ModelRegistry::default().for_gateway(DRYRUN_GATEWAY)));
            return Ok(Self::new(
                config,
                store,
                Box::new(DryrunImageClient),
                Box::new(DryrunTextClient),
                storage,
            )
            .with_model_selector(selector));
        }
        let image_client = Box::new(OpenRouterImageClient::new(&config)?);
        let text_client = Box::new(OpenRouterTextClient::new(&config)?);
        Ok(Self::new(config, store, image_client, text_client, storage))
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn with_model_selector(mut self, selector: ModelSelector) -> Self {
        self.model_selector = selector;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn content(&self, id: Uuid) -> PipelineResult<GeneratedContent> {
        self.store
            .content(id)?
            .ok_or_else(|| PipelineError::not_found("content", id))
    }

    /// Trend to persisted draft: copy, role normalisation, template ids and
    /// the frozen brand snapshot.
    pub fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> PipelineResult<GeneratedContent> {
        self.emit(
            "generation_started",
            json!({
                "trend_id": request.trend_id,
                "content_type": request.content_type,
                "visual_mode": request.visual_mode,
                "brand_id": request.brand_id,
            }),
        );
        let trend = self
            .store
            .trend(request.trend_id)?
            .ok_or_else(|| PipelineError::not_found("trend", request.trend_id))?;
        let mode = request.visual_mode;
        let category = request
            .category
            .clone()
            .or_else(|| trend.category.clone())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let brand_id = request.brand_id.filter(|_| mode.is_branded());
        let style_gallery_id = request.style_gallery_id.filter(|_| mode.is_branded());
        match (mode, brand_id, style_gallery_id) {
            (VisualMode::BrandStrict, None, _) => {
                return Err(PipelineError::InsufficientData(
                    "brand_strict content needs a brand".to_string(),
                ));
            }
            (VisualMode::BrandGuided, None, None) => {
                return Err(PipelineError::InsufficientData(
                    "brand_guided content needs a brand or a style gallery".to_string(),
                ));
            }
            _ => {}
        }
        let tokens: Option<BrandTokens> = match brand_id {
            Some(id) => Some(
                self.store
                    .brand(id)?
                    .ok_or_else(|| PipelineError::not_found("brand", id))?
                    .tokens(),
            ),
            None => None,
        };
        let template_set: Option<TemplateSet> = match brand_id {
            Some(id) => self.store.active_template_set(id, category.as_deref())?,
            None => None,
        };

        let model = self.select_model(
            request.text_model.as_deref().or(self.config.text_model.as_deref()),
            ModelCapability::Text,
        )?;
        let copy = CopyGenerator::new(self.text_client.as_ref(), model.name.clone())
            .with_retry(self.config.retry.clone())
            .generate(&CopyRequest {
                trend: &trend,
                style: &request.style,
                format: request.content_type,
                mode,
                brand: tokens.as_ref(),
            })?;

        let mut content = GeneratedContent::draft(request.content_type, mode);
        content.title = copy.title;
        content.caption = copy.caption;
        content.hashtags = copy.hashtags;
        content.slides = copy.slides;
        content.brand_id = brand_id;
        content.style_gallery_id = style_gallery_id;
        content.trend_id = Some(trend.id);
        content.category = category;

        let plan = TemplateResolver::new(mode, request.content_type)
            .with_style_guide(tokens.as_ref().and_then(|tokens| tokens.style_guide.as_ref()))
            .with_template_set(template_set.as_ref())
            .apply(&mut content.slides);
        content.brand_snapshot = tokens;
        self.store.save_content(&content)?;

        tracing::info!(
            content_id = %content.id,
            content_type = %content.content_type,
            visual_mode = content.visual_mode.as_str(),
            template_set = ?template_set.as_ref().map(|set| set.version),
            "content generated"
        );
        self.emit(
            "content_generated",
            json!({
                "content_id": content.id,
                "text_model": model.name,
                "templates": plan.iter().map(|entry| entry.template.clone()).collect::<Vec<_>>(),
                "image_policy": plan.first().map(|entry| entry.image.as_str()),
            }),
        );
        Ok(content)
    }

    /// Full-slide image in free mode, background otherwise. Strict content
    /// never reaches the image collaborator.
    pub fn generate_slide_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        options: &ImageOptions,
    ) -> PipelineResult<SlideImageResult> {
        self.generate_image(content_id, slide_index, ImageKind::Slide, options)
    }

    pub fn generate_background_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        options: &ImageOptions,
    ) -> PipelineResult<SlideImageResult> {
        self.generate_image(content_id, slide_index, ImageKind::Background, options)
    }

    fn generate_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        kind: ImageKind,
        options: &ImageOptions,
    ) -> PipelineResult<SlideImageResult> {
        let content = self.content(content_id)?;
        if content.slides.get(slide_index).is_none() {
            return Err(PipelineError::not_found("slide", slide_index));
        }
        if kind.policy(content.visual_mode) == ImagePolicy::None {
            self.emit_skipped(&content, slide_index);
            return Err(PipelineError::InsufficientData(
                "brand_strict content is rendered from templates only".to_string(),
            ));
        }
        let model = self.image_model(options)?;
        let request = self.synthesis_request(&content, slide_index, kind, options, &model)?;
        let synthesizer = self.synthesizer(&model);
        match synthesizer.synthesize(&request) {
            Ok(outcome) => {
                self.store
                    .upsert_slide_image(content_id, slide_index, &outcome.image_url)
                    .map_err(|err| self.record_failure(content_id, slide_index, err))?;
                self.emit_generated(content_id, &outcome);
                Ok(SlideImageResult {
                    kind,
                    slide_index,
                    image_url: outcome.image_url,
                    debug: outcome.debug,
                })
            }
            Err(err) => Err(self.record_failure(content_id, slide_index, err)),
        }
    }

    /// Every slide in batches. Per-slide failures are reported, never
    /// propagated; only setup problems (missing content, no references at
    /// all, no model) fail the call.
    pub fn generate_all_images(
        &self,
        content_id: Uuid,
        options: &ImageOptions,
    ) -> PipelineResult<BatchReport> {
        let started_at = Utc::now();
        let content = self.content(content_id)?;
        let kind = ImageKind::Slide;
        let mut statuses: Vec<Option<SlideImageStatus>> = vec![None; content.slides.len()];

        let mut requests = Vec::new();
        if kind.policy(content.visual_mode) == ImagePolicy::None {
            for index in 0..content.slides.len() {
                self.emit_skipped(&content, index);
                statuses[index] = Some(SlideImageStatus {
                    slide_index: index,
                    state: SlideImageState::Skipped,
                    image_url: None,
                    error: None,
                });
            }
        } else {
            let model = self.image_model(options)?;
            for index in 0..content.slides.len() {
                match self.synthesis_request(&content, index, kind, options, &model) {
                    Ok(request) => requests.push(request),
                    Err(err @ PipelineError::InsufficientData(_))
                    | Err(err @ PipelineError::NotFound { .. }) => return Err(err),
                    Err(err) => {
                        statuses[index] = Some(self.failed_status(content_id, index, err));
                    }
                }
            }
            let outcomes = self.synthesizer(&model).synthesize_batch(
                &requests,
                self.config.batch_size,
                self.config.batch_delay,
            );
            for (request, outcome) in requests.iter().zip(outcomes) {
                let index = request.slide_index;
                let stored = outcome.and_then(|outcome| {
                    self.store
                        .upsert_slide_image(content_id, index, &outcome.image_url)?;
                    Ok(outcome)
                });
                statuses[index] = Some(match stored {
                    Ok(outcome) => {
                        self.emit_generated(content_id, &outcome);
                        SlideImageStatus {
                            slide_index: index,
                            state: SlideImageState::Generated,
                            image_url: Some(outcome.image_url),
                            error: None,
                        }
                    }
                    Err(err) => self.failed_status(content_id, index, err),
                });
            }
        }

        let slides: Vec<SlideImageStatus> = statuses.into_iter().flatten().collect();
        let count = |state: SlideImageState| slides.iter().filter(|slide| slide.state == state).count();
        let summary = BatchSummary {
            content_id,
            attempted: requests.len(),
            succeeded: count(SlideImageState::Generated),
            failed: count(SlideImageState::Failed),
            skipped: count(SlideImageState::Skipped),
            started_at,
            finished_at: Utc::now(),
        };
        self.write_batch_summary(&summary, &slides);
        tracing::info!(
            content_id = %content_id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "image batch finished"
        );
        self.emit(
            "batch_finished",
            json!({
                "content_id": content_id,
                "attempted": summary.attempted,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
                "skipped": summary.skipped,
            }),
        );
        Ok(BatchReport {
            content: self.content(content_id)?,
            summary,
            slides,
        })
    }

    pub fn edit_slide(
        &self,
        content_id: Uuid,
        slide_index: usize,
        edit: SlideEdit,
    ) -> PipelineResult<GeneratedContent> {
        let mut content = self.content(content_id)?;
        content.edit_slide(slide_index, edit)?;
        self.store.save_content(&content)?;
        Ok(content)
    }

    pub fn set_status(
        &self,
        content_id: Uuid,
        next: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> PipelineResult<GeneratedContent> {
        let mut content = self.content(content_id)?;
        let from = content.status;
        content.set_status(next, scheduled_at, Utc::now())?;
        self.store.save_content(&content)?;
        self.emit(
            "status_changed",
            json!({
                "content_id": content_id,
                "from": from,
                "to": content.status,
                "scheduled_at": content.scheduled_at,
            }),
        );
        Ok(content)
    }

    pub fn activate_template_set(&self, set: TemplateSet) -> PipelineResult<TemplateSet> {
        let stored = self.store.activate_template_set(set)?;
        tracing::info!(
            brand_id = %stored.brand_id,
            category = stored.category.as_deref().unwrap_or("-"),
            version = stored.version,
            "template set activated"
        );
        Ok(stored)
    }

    fn select_model(
        &self,
        requested: Option<&str>,
        capability: ModelCapability,
    ) -> PipelineResult<ModelSpec> {
        let selection = self
            .model_selector
            .select(requested, capability)
            .map_err(PipelineError::Configuration)?;
        if let (Some(requested), Some(reason)) = (
            selection.requested.as_deref(),
            selection.fallback_reason.as_deref(),
        ) {
            tracing::warn!(requested, model = %selection.model.name, reason, "model fallback");
        }
        Ok(selection.model)
    }

    fn image_model(&self, options: &ImageOptions) -> PipelineResult<ModelSpec> {
        self.select_model(
            options
                .image_model
                .as_deref()
                .or(self.config.image_model.as_deref()),
            ModelCapability::Image,
        )
    }

    fn synthesizer(&self, model: &ModelSpec) -> ImageSynthesizer<'_> {
        ImageSynthesizer::new(
            self.image_client.as_ref(),
            self.storage.as_ref(),
            model.name.clone(),
        )
        .with_retry(self.config.retry.clone())
        .with_receipts_dir(self.config.receipts_dir.clone())
    }

    fn synthesis_request(
        &self,
        content: &GeneratedContent,
        slide_index: usize,
        kind: ImageKind,
        options: &ImageOptions,
        model: &ModelSpec,
    ) -> PipelineResult<SynthesisRequest> {
        let slide = content
            .slides
            .get(slide_index)
            .ok_or_else(|| PipelineError::not_found("slide", slide_index))?;
        let policy = kind.policy(content.visual_mode);
        let references = if policy == ImagePolicy::Background {
            let cap = model
                .max_reference_images
                .unwrap_or(MAX_REFERENCES_CEILING)
                .min(self.config.max_references);
            ReferenceSelector::new(self.store.as_ref(), cap).select(&ReferenceRequest {
                brand_id: content.brand_id,
                category: content.category.clone(),
                format: content.content_type,
                role: slide.role,
                style_gallery_id: options.style_gallery_id.or(content.style_gallery_id),
            })?
        } else {
            ReferenceSet::empty()
        };
        let prompt = build_image_prompt(&ImagePromptInput {
            policy,
            format: content.content_type,
            role: slide.role,
            slide,
            brand: content
                .brand_snapshot
                .as_ref()
                .filter(|_| policy == ImagePolicy::Background),
            safe_area: SafeArea {
                top: self.config.safe_area_top,
                bottom: self.config.safe_area_bottom,
            },
            reference_count: references.len(),
        });
        Ok(SynthesisRequest {
            content_id: content.id,
            slide_index,
            prompt,
            references,
            aspect_ratio: Some(aspect_ratio(content.content_type).to_string()),
        })
    }

    fn record_failure(&self, content_id: Uuid, slide_index: usize, err: PipelineError) -> PipelineError {
        tracing::warn!(
            content_id = %content_id,
            slide_index,
            category = err.category(),
            error = %err,
            "slide image failed"
        );
        self.emit(
            "slide_image_failed",
            json!({
                "content_id": content_id,
                "slide_index": slide_index,
                "category": err.category(),
                "status": err.http_status(),
                "error": err.to_string(),
            }),
        );
        err
    }

    fn failed_status(&self, content_id: Uuid, slide_index: usize, err: PipelineError) -> SlideImageStatus {
        let err = self.record_failure(content_id, slide_index, err);
        SlideImageStatus {
            slide_index,
            state: SlideImageState::Failed,
            image_url: None,
            error: Some(err.to_string()),
        }
    }

    fn emit_generated(&self, content_id: Uuid, outcome: &SynthesisOutcome) {
        self.emit(
            "slide_image_generated",
            json!({
                "content_id": content_id,
                "slide_index": outcome.slide_index,
                "image_url": outcome.image_url,
                "storage_key": outcome.storage_key,
                "debug": outcome.debug,
            }),
        );
    }

    fn emit_skipped(&self, content: &GeneratedContent, slide_index: usize) {
        tracing::debug!(content_id = %content.id, slide_index, "strict mode; image skipped");
        self.emit(
            "slide_image_skipped",
            json!({
                "content_id": content.id,
                "slide_index": slide_index,
                "visual_mode": content.visual_mode,
            }),
        );
    }

    fn write_batch_summary(&self, summary: &BatchSummary, slides: &[SlideImageStatus]) {
        let Some(dir) = self.config.receipts_dir.as_ref() else {
            return;
        };
        let path = dir.join(summary.content_id.to_string()).join(format!(
            "summary-{}.json",
            summary.finished_at.timestamp_millis()
        ));
        let mut extra = Map::new();
        extra.insert(
            "slides".to_string(),
            serde_json::to_value(slides).unwrap_or(Value::Null),
        );
        if let Err(err) = write_summary(&path, summary, Some(&extra)) {
            tracing::warn!(path = %path.display(), error = %err, "batch summary not written");
        }
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload = payload.as_object().cloned().unwrap_or_default();
        if let Err(err) = self.events.emit(event_type, payload) {
            tracing::warn!(event_type, error = %err, "event not recorded");
        }
    }
}
