use std::sync::{Mutex, MutexGuard};

use trendcast_contracts::brand::BrandRecord;
use trendcast_contracts::content::GeneratedContent;
use trendcast_contracts::references::{BrandExample, StyleGallery};
use trendcast_contracts::templates::TemplateSet;
use trendcast_contracts::trends::Trend;
use uuid::Uuid;

use super::{DataStore, ExampleQuery, StoreSnapshot};
use crate::error::{PipelineError, PipelineResult};

/// Process-local store, used by tests and by dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> PipelineResult<StoreSnapshot> {
        Ok(self.lock()?.clone())
    }

    pub fn insert_brand(&self, brand: BrandRecord) -> PipelineResult<()> {
        self.lock()?.brands.push(brand);
        Ok(())
    }

    pub fn insert_example(&self, example: BrandExample) -> PipelineResult<()> {
        self.lock()?.brand_examples.push(example);
        Ok(())
    }

    pub fn insert_style_gallery(&self, gallery: StyleGallery) -> PipelineResult<()> {
        self.lock()?.style_galleries.push(gallery);
        Ok(())
    }

    pub fn insert_trend(&self, trend: Trend) -> PipelineResult<()> {
        self.lock()?.trends.push(trend);
        Ok(())
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, StoreSnapshot>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::Store("memory store lock poisoned".to_string()))
    }
}

impl DataStore for MemoryStore {
    fn brand(&self, id: Uuid) -> PipelineResult<Option<BrandRecord>> {
        Ok(self.lock()?.brand(id))
    }

    fn brand_examples(&self, query: &ExampleQuery) -> PipelineResult<Vec<BrandExample>> {
        Ok(self.lock()?.brand_examples(query))
    }

    fn active_template_set(
        &self,
        brand_id: Uuid,
        category: Option<&str>,
    ) -> PipelineResult<Option<TemplateSet>> {
        Ok(self.lock()?.active_template_set(brand_id, category))
    }

    fn activate_template_set(&self, set: TemplateSet) -> PipelineResult<TemplateSet> {
        Ok(self.lock()?.activate_template_set(set))
    }

    fn style_gallery(&self, id: Uuid) -> PipelineResult<Option<StyleGallery>> {
        Ok(self.lock()?.style_gallery(id))
    }

    fn trend(&self, id: Uuid) -> PipelineResult<Option<Trend>> {
        Ok(self.lock()?.trend(id))
    }

    fn content(&self, id: Uuid) -> PipelineResult<Option<GeneratedContent>> {
        Ok(self.lock()?.content(id))
    }

    fn save_content(&self, content: &GeneratedContent) -> PipelineResult<()> {
        self.lock()?.save_content(content);
        Ok(())
    }

    fn upsert_slide_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        url: &str,
    ) -> PipelineResult<GeneratedContent> {
        self.lock()?.upsert_slide_image(content_id, slide_index, url)
    }
}
