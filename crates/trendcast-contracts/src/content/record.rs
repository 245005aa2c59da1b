use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContentFormat, ContentStatus, LifecycleError, Slide, SlideEdit, VisualMode};
use crate::brand::BrandTokens;

/// The persisted envelope of one generated post, story or carousel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub slides: Vec<Slide>,
    pub content_type: ContentFormat,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    /// Frozen at generation time; later brand edits do not reach it.
    #[serde(default)]
    pub brand_snapshot: Option<BrandTokens>,
    #[serde(default)]
    pub visual_mode: VisualMode,
    /// System gallery grounding brandless guided content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_gallery_id: Option<Uuid>,
    #[serde(default)]
    pub trend_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeneratedContent {
    pub fn draft(content_type: ContentFormat, visual_mode: VisualMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            caption: String::new(),
            hashtags: Vec::new(),
            slides: Vec::new(),
            content_type,
            status: ContentStatus::Draft,
            scheduled_at: None,
            brand_id: None,
            brand_snapshot: None,
            visual_mode,
            style_gallery_id: None,
            trend_id: None,
            category: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn approve(&mut self) -> Result<(), LifecycleError> {
        self.transition(ContentStatus::Approved)
    }

    pub fn reject(&mut self) -> Result<(), LifecycleError> {
        self.transition(ContentStatus::Rejected)
    }

    /// Enters `scheduled`. The timestamp must be present and not earlier
    /// than `now`.
    pub fn schedule(
        &mut self,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        let at = at.ok_or(LifecycleError::MissingSchedule)?;
        if at < now {
            return Err(LifecycleError::ScheduleInPast { at });
        }
        self.check(ContentStatus::Scheduled)?;
        self.scheduled_at = Some(at);
        self.status = ContentStatus::Scheduled;
        self.touch();
        Ok(())
    }

    pub fn publish(&mut self) -> Result<(), LifecycleError> {
        self.transition(ContentStatus::Published)
    }

    /// Back to `draft` from `approved` or `scheduled`.
    pub fn reopen(&mut self) -> Result<(), LifecycleError> {
        self.transition(ContentStatus::Draft)
    }

    /// `scheduled` back to `approved`.
    pub fn remove_schedule(&mut self) -> Result<(), LifecycleError> {
        if self.status != ContentStatus::Scheduled {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: ContentStatus::Approved,
            });
        }
        self.transition(ContentStatus::Approved)
    }

    /// Generic status setter used by callers that receive a target status
    /// rather than an operation.
    pub fn set_status(
        &mut self,
        next: ContentStatus,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        match next {
            ContentStatus::Scheduled => self.schedule(scheduled_at, now),
            other => self.transition(other),
        }
    }

    pub fn edit_slide(&mut self, index: usize, edit: SlideEdit) -> Result<(), LifecycleError> {
        let slide = self
            .slides
            .get_mut(index)
            .ok_or(LifecycleError::SlideOutOfRange { index })?;
        slide.apply_edit(edit);
        self.touch();
        Ok(())
    }

    /// Upserts the image of one slide.
    pub fn set_slide_image(&mut self, index: usize, url: &str) -> Result<(), LifecycleError> {
        let slide = self
            .slides
            .get_mut(index)
            .ok_or(LifecycleError::SlideOutOfRange { index })?;
        slide.set_image(url);
        self.touch();
        Ok(())
    }

    fn transition(&mut self, next: ContentStatus) -> Result<(), LifecycleError> {
        self.check(next)?;
        if self.status == ContentStatus::Scheduled {
            self.scheduled_at = None;
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    fn check(&self, next: ContentStatus) -> Result<(), LifecycleError> {
        if self.status.can_transition_to(next) {
            return Ok(());
        }
        Err(LifecycleError::InvalidTransition {
            from: self.status,
            to: next,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
