//! Request/response access to brands, examples, template sets, trends and
//! content records.
//!
//! Writes are whole-record upserts keyed by id; concurrent writers to the
//! same record resolve last-write-wins.

mod json_file;
mod memory;

use serde::{Deserialize, Serialize};
use trendcast_contracts::brand::BrandRecord;
use trendcast_contracts::content::{ContentFormat, GeneratedContent};
use trendcast_contracts::references::{BrandExample, StyleGallery};
use trendcast_contracts::templates::{TemplateSet, TemplateSetStatus};
use trendcast_contracts::trends::Trend;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleQuery {
    pub brand_id: Uuid,
    pub category: Option<String>,
    pub content_type: Option<ContentFormat>,
    pub limit: usize,
}

pub trait DataStore: Send + Sync {
    fn brand(&self, id: Uuid) -> PipelineResult<Option<BrandRecord>>;

    /// Matching examples, most recent first, at most `query.limit`.
    fn brand_examples(&self, query: &ExampleQuery) -> PipelineResult<Vec<BrandExample>>;

    fn active_template_set(
        &self,
        brand_id: Uuid,
        category: Option<&str>,
    ) -> PipelineResult<Option<TemplateSet>>;

    /// Stores `set` as the active set of its brand+category, archiving the
    /// previous one.
    fn activate_template_set(&self, set: TemplateSet) -> PipelineResult<TemplateSet>;

    fn style_gallery(&self, id: Uuid) -> PipelineResult<Option<StyleGallery>>;

    fn trend(&self, id: Uuid) -> PipelineResult<Option<Trend>>;

    fn content(&self, id: Uuid) -> PipelineResult<Option<GeneratedContent>>;

    fn save_content(&self, content: &GeneratedContent) -> PipelineResult<()>;

    /// Idempotent per `(content_id, slide_index)`.
    fn upsert_slide_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        url: &str,
    ) -> PipelineResult<GeneratedContent>;
}

/// Whole-store document; also the on-disk format of [`JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub brands: Vec<BrandRecord>,
    #[serde(default)]
    pub brand_examples: Vec<BrandExample>,
    #[serde(default)]
    pub template_sets: Vec<TemplateSet>,
    #[serde(default)]
    pub style_galleries: Vec<StyleGallery>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub contents: Vec<GeneratedContent>,
}

impl StoreSnapshot {
    fn brand(&self, id: Uuid) -> Option<BrandRecord> {
        self.brands.iter().find(|brand| brand.id == id).cloned()
    }

    fn brand_examples(&self, query: &ExampleQuery) -> Vec<BrandExample> {
        let mut rows: Vec<BrandExample> = self
            .brand_examples
            .iter()
            .filter(|row| row.brand_id == query.brand_id)
            .filter(|row| match query.category.as_deref() {
                Some(category) => row.category.as_deref() == Some(category),
                None => true,
            })
            .filter(|row| match query.content_type {
                Some(content_type) => row.content_type == Some(content_type),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(query.limit);
        rows
    }

    fn active_template_set(&self, brand_id: Uuid, category: Option<&str>) -> Option<TemplateSet> {
        let active = |wanted: Option<&str>| {
            self.template_sets
                .iter()
                .filter(|set| set.brand_id == brand_id && set.is_active())
                .filter(|set| set.category.as_deref() == wanted)
                .max_by_key(|set| set.version)
                .cloned()
        };
        active(category).or_else(|| category.and_then(|_| active(None)))
    }

    fn activate_template_set(&mut self, mut set: TemplateSet) -> TemplateSet {
        let latest = self
            .template_sets
            .iter()
            .filter(|existing| existing.same_scope(&set))
            .map(|existing| existing.version)
            .max()
            .unwrap_or(0);
        for existing in self
            .template_sets
            .iter_mut()
            .filter(|existing| existing.same_scope(&set))
        {
            existing.status = TemplateSetStatus::Archived;
        }
        set.version = latest + 1;
        set.status = TemplateSetStatus::Active;
        self.template_sets.retain(|existing| existing.id != set.id);
        self.template_sets.push(set.clone());
        set
    }

    fn style_gallery(&self, id: Uuid) -> Option<StyleGallery> {
        self.style_galleries.iter().find(|row| row.id == id).cloned()
    }

    fn trend(&self, id: Uuid) -> Option<Trend> {
        self.trends.iter().find(|row| row.id == id).cloned()
    }

    fn content(&self, id: Uuid) -> Option<GeneratedContent> {
        self.contents.iter().find(|row| row.id == id).cloned()
    }

    fn save_content(&mut self, content: &GeneratedContent) {
        match self.contents.iter_mut().find(|row| row.id == content.id) {
            Some(existing) => *existing = content.clone(),
            None => self.contents.push(content.clone()),
        }
    }

    fn upsert_slide_image(
        &mut self,
        content_id: Uuid,
        slide_index: usize,
        url: &str,
    ) -> PipelineResult<GeneratedContent> {
        let content = self
            .contents
            .iter_mut()
            .find(|row| row.id == content_id)
            .ok_or_else(|| PipelineError::not_found("content", content_id))?;
        content.set_slide_image(slide_index, url)?;
        Ok(content.clone())
    }
}
