mod common;

use std::time::Duration;

use common::trend;
use trendcast_contracts::content::{ContentFormat, VisualMode};
use trendcast_contracts::events::EventLog;
use trendcast_contracts::trends::StyleConfig;
use trendcast_engine::{
    EngineConfig, GenerateContentRequest, ImageOptions, MemoryStore, Pipeline, RetryPolicy,
    StorageConfig,
};

#[test]
fn dryrun_pipeline_reports_the_offline_models() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = MemoryStore::new();
    let trend_id = trend(&store, None)?;

    let mut config = EngineConfig::default();
    config.image_model = Some("google/gemini-2.5-flash-image-preview".to_string());
    config.text_model = Some("google/gemini-2.5-flash".to_string());
    config.retry = RetryPolicy::immediate();
    config.batch_delay = Duration::ZERO;
    config.receipts_dir = Some(dir.path().join("receipts"));
    config.storage = StorageConfig::Local {
        root: dir.path().join("media"),
        public_base_url: common::MEDIA_BASE.to_string(),
    };
    let pipeline = Pipeline::from_config(config, Box::new(store), true)?
        .with_events(EventLog::new(dir.path().join("events.jsonl"), "req-dry"));

    let content = pipeline.generate_content(&GenerateContentRequest {
        trend_id,
        style: StyleConfig::default(),
        content_type: ContentFormat::Post,
        visual_mode: VisualMode::Free,
        brand_id: None,
        category: None,
        style_gallery_id: None,
        text_model: None,
    })?;
    let image = pipeline.generate_slide_image(
        content.id,
        0,
        &ImageOptions {
            style_gallery_id: None,
            image_model: Some("google/gemini-3-pro-image-preview".to_string()),
        },
    )?;
    assert_eq!(image.debug.model, "dryrun-image");

    let raw = std::fs::read_to_string(dir.path().join("events.jsonl"))?;
    let generated = raw
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .find(|event| event["type"] == "content_generated")
        .ok_or_else(|| anyhow::anyhow!("no content_generated event"))?;
    assert_eq!(generated["text_model"], "dryrun-text");
    Ok(())
}
