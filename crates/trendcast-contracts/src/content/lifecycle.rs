use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Approved,
    Scheduled,
    Rejected,
    Published,
}

impl ContentStatus {
    pub const ALL: [ContentStatus; 5] = [
        Self::Draft,
        Self::Approved,
        Self::Scheduled,
        Self::Rejected,
        Self::Published,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Scheduled => "scheduled",
            Self::Rejected => "rejected",
            Self::Published => "published",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Published)
    }

    /// Every legal edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, next),
            (Draft, Approved)
                | (Draft, Rejected)
                | (Approved, Scheduled)
                | (Approved, Draft)
                | (Scheduled, Published)
                | (Scheduled, Approved)
                | (Scheduled, Draft)
        )
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown content status '{raw}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("cannot move content from {from} to {to}")]
    InvalidTransition {
        from: ContentStatus,
        to: ContentStatus,
    },
    #[error("scheduling requires a scheduled_at timestamp")]
    MissingSchedule,
    #[error("scheduled_at {at} is in the past")]
    ScheduleInPast { at: DateTime<Utc> },
    #[error("slide {index} does not exist")]
    SlideOutOfRange { index: usize },
}
