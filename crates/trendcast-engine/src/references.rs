//! Reference selection for AI image synthesis.
//!
//! Tiers are tried in order and the first acceptable one wins:
//! `exact_category` and `category_any_type` need at least
//! [`MIN_TIER_MATCHES`] distinct image URLs, `brand_wide` takes anything
//! non-empty.
//! Brandless requests may instead draw from a system style gallery.

use trendcast_contracts::content::{ContentFormat, SlideRole};
use trendcast_contracts::references::{
    BrandExample, FallbackLevel, ReferenceSet, StyleGallery, GALLERY_CONTENT_ROLE,
};
use uuid::Uuid;

use crate::config::MAX_REFERENCES_CEILING;
use crate::error::{PipelineError, PipelineResult};
use crate::store::{DataStore, ExampleQuery};

/// Examples fetched per tier.
pub const TIER_FETCH_LIMIT: usize = 12;
pub const MIN_TIER_MATCHES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRequest {
    pub brand_id: Option<Uuid>,
    pub category: Option<String>,
    pub format: ContentFormat,
    pub role: SlideRole,
    pub style_gallery_id: Option<Uuid>,
}

pub struct ReferenceSelector<'a> {
    store: &'a dyn DataStore,
    max_references: usize,
}

impl<'a> ReferenceSelector<'a> {
    pub fn new(store: &'a dyn DataStore, max_references: usize) -> Self {
        Self {
            store,
            max_references: max_references.clamp(1, MAX_REFERENCES_CEILING),
        }
    }

    /// Picks the references for one slide.
    ///
    /// A brand or gallery with nothing to offer is an
    /// [`PipelineError::InsufficientData`]; a request with neither returns
    /// an empty `none` set.
    pub fn select(&self, request: &ReferenceRequest) -> PipelineResult<ReferenceSet> {
        if let Some(brand_id) = request.brand_id {
            return self.select_for_brand(brand_id, request);
        }
        if let Some(gallery_id) = request.style_gallery_id {
            let gallery = self
                .store
                .style_gallery(gallery_id)?
                .ok_or_else(|| PipelineError::not_found("style gallery", gallery_id))?;
            return self.select_from_gallery(&gallery, request.format, request.role);
        }
        Ok(ReferenceSet::empty())
    }

    fn select_for_brand(
        &self,
        brand_id: Uuid,
        request: &ReferenceRequest,
    ) -> PipelineResult<ReferenceSet> {
        let category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if let Some(category) = category {
            let tiers = [
                (FallbackLevel::ExactCategory, Some(request.format)),
                (FallbackLevel::CategoryAnyType, None),
            ];
            for (level, content_type) in tiers {
                let rows = self.store.brand_examples(&ExampleQuery {
                    brand_id,
                    category: Some(category.to_string()),
                    content_type,
                    limit: TIER_FETCH_LIMIT,
                })?;
                let urls = unique_urls(example_urls(&rows));
                if urls.len() >= MIN_TIER_MATCHES {
                    return Ok(self.capped(urls, level));
                }
                tracing::debug!(
                    brand_id = %brand_id,
                    fallback_level = level.as_str(),
                    matched = urls.len(),
                    "reference tier below threshold"
                );
            }
        }

        let rows = self.store.brand_examples(&ExampleQuery {
            brand_id,
            category: None,
            content_type: None,
            limit: TIER_FETCH_LIMIT,
        })?;
        let urls = unique_urls(example_urls(&rows));
        if urls.is_empty() {
            return Err(PipelineError::InsufficientData(
                "insufficient brand examples: upload at least one example image for this brand"
                    .to_string(),
            ));
        }
        Ok(self.capped(urls, FallbackLevel::BrandWide))
    }

    fn select_from_gallery(
        &self,
        gallery: &StyleGallery,
        format: ContentFormat,
        role: SlideRole,
    ) -> PipelineResult<ReferenceSet> {
        let by_role = gallery.references.get(&format);
        let pick = |key: &str| {
            by_role
                .and_then(|roles| roles.get(key))
                .filter(|urls| !urls.is_empty())
                .cloned()
        };
        let urls = pick(role.as_str())
            .or_else(|| pick(GALLERY_CONTENT_ROLE))
            .unwrap_or_else(|| {
                by_role
                    .map(|roles| roles.values().flatten().cloned().collect())
                    .unwrap_or_default()
            });
        let urls = unique_urls(urls);
        if urls.is_empty() {
            return Err(PipelineError::InsufficientData(format!(
                "style gallery '{}' has no references for {format}",
                gallery.name
            )));
        }
        Ok(self.capped(urls, FallbackLevel::StyleGallery))
    }

    fn capped(&self, mut urls: Vec<String>, level: FallbackLevel) -> ReferenceSet {
        let matched = urls.len();
        urls.truncate(self.max_references);
        ReferenceSet {
            urls,
            fallback_level: level,
            matched,
        }
    }
}

fn example_urls(rows: &[BrandExample]) -> Vec<String> {
    rows.iter().map(|row| row.image_url.clone()).collect()
}

/// Trimmed, non-blank URLs in first-seen order.
fn unique_urls(urls: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim().to_string();
        if !url.is_empty() && !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}
