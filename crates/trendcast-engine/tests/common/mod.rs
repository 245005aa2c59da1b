#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use trendcast_contracts::brand::BrandRecord;
use trendcast_contracts::content::ContentFormat;
use trendcast_contracts::events::EventLog;
use trendcast_contracts::references::BrandExample;
use trendcast_contracts::trends::Trend;
use trendcast_engine::providers::{
    ContentPart, DryrunImageClient, DryrunTextClient, ImageGenerationClient,
    ImageGenerationRequest, ImageGenerationResponse, IMAGE_COLLABORATOR,
};
use trendcast_engine::storage::LocalObjectStorage;
use trendcast_engine::{EngineConfig, MemoryStore, Pipeline, PipelineError, PipelineResult, RetryPolicy};
use uuid::Uuid;

pub const MEDIA_BASE: &str = "https://media.test";

/// What the image collaborator was asked, shared with the test body.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ImageGenerationRequest>>>,
}

impl Recorder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.prompt().to_string())
            .collect()
    }

    pub fn reference_urls(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .map(|request| {
                request
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::ImageUrl(url) => Some(url.clone()),
                        ContentPart::Text(_) => None,
                    })
                    .collect()
            })
            .collect()
    }

    fn requests(&self) -> Vec<ImageGenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy)]
pub enum Behavior {
    Succeed,
    /// Every call answers with this status.
    AlwaysStatus(u16),
}

/// Dryrun images, optionally failing every call or only prompts that
/// contain a marker.
pub struct RecordingImageClient {
    recorder: Recorder,
    behavior: Behavior,
    fail_marker: Option<String>,
}

impl ImageGenerationClient for RecordingImageClient {
    fn name(&self) -> &str {
        "recorder"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> PipelineResult<ImageGenerationResponse> {
        self.recorder.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.recorder.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(marker) = self.fail_marker.as_deref() {
            if request.prompt().contains(marker) {
                return Err(PipelineError::Upstream {
                    collaborator: IMAGE_COLLABORATOR,
                    status: 400,
                    message: "content policy".to_string(),
                });
            }
        }
        match self.behavior {
            Behavior::Succeed => DryrunImageClient.generate(request),
            Behavior::AlwaysStatus(402) => Err(PipelineError::Quota {
                collaborator: IMAGE_COLLABORATOR,
                message: "credits exhausted".to_string(),
            }),
            Behavior::AlwaysStatus(status) => Err(PipelineError::Upstream {
                collaborator: IMAGE_COLLABORATOR,
                status,
                message: "busy".to_string(),
            }),
        }
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub recorder: Recorder,
    pub dir: TempDir,
}

pub struct HarnessBuilder {
    store: MemoryStore,
    behavior: Behavior,
    fail_marker: Option<String>,
    events: bool,
}

impl HarnessBuilder {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            behavior: Behavior::Succeed,
            fail_marker: None,
            events: false,
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn fail_prompts_containing(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_events(mut self) -> Self {
        self.events = true;
        self
    }

    pub fn build(self) -> anyhow::Result<Harness> {
        let dir = tempfile::tempdir()?;
        let mut config = EngineConfig::default();
        config.image_model = Some("dryrun-image".to_string());
        config.text_model = Some("dryrun-text".to_string());
        config.retry = RetryPolicy::immediate();
        config.batch_delay = Duration::ZERO;
        config.receipts_dir = Some(dir.path().join("receipts"));

        let recorder = Recorder::default();
        let image_client = RecordingImageClient {
            recorder: recorder.clone(),
            behavior: self.behavior,
            fail_marker: self.fail_marker,
        };
        let storage = LocalObjectStorage::new(dir.path().join("media"), MEDIA_BASE);
        let mut pipeline = Pipeline::new(
            config,
            Box::new(self.store),
            Box::new(image_client),
            Box::new(DryrunTextClient),
            Box::new(storage),
        );
        if self.events {
            pipeline = pipeline.with_events(EventLog::new(dir.path().join("events.jsonl"), "req-test"));
        }
        Ok(Harness {
            pipeline,
            recorder,
            dir,
        })
    }
}

pub fn trend(store: &MemoryStore, category: Option<&str>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    store.insert_trend(Trend {
        id,
        title: "Central banks cut rates again".to_string(),
        summary: "A third cut this year as inflation cools.".to_string(),
        source: Some("Newswire".to_string()),
        url: None,
        category: category.map(str::to_string),
        published_at: None,
    })?;
    Ok(id)
}

pub fn brand(store: &MemoryStore) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let record: BrandRecord = serde_json::from_value(json!({
        "id": id,
        "name": "Harbor Capital",
        "palette": ["#0B3D91", "#FFFFFF", "#FC3D21", "not-a-color"],
        "fonts": {"headings": "Archivo", "body": "Inter"},
        "visual_tone": "calm, premium",
        "dont_rules": ["neon colors"],
    }))?;
    store.insert_brand(record)?;
    Ok(id)
}

/// `count` examples, index 0 the most recent.
pub fn examples(
    store: &MemoryStore,
    brand_id: Uuid,
    count: usize,
    category: Option<&str>,
    content_type: Option<ContentFormat>,
) -> anyhow::Result<Vec<String>> {
    let newest = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid fixture date"))?;
    let mut urls = Vec::new();
    for index in 0..count {
        let image_url = format!("https://cdn.test/{brand_id}/ex-{index}.png");
        store.insert_example(BrandExample {
            id: Uuid::new_v4(),
            brand_id,
            image_url: image_url.clone(),
            category: category.map(str::to_string),
            content_type,
            created_at: newest - chrono::Duration::minutes(index as i64),
        })?;
        urls.push(image_url);
    }
    Ok(urls)
}
