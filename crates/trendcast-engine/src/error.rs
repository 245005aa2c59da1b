use thiserror::Error;
use trendcast_contracts::content::LifecycleError;

use crate::retry::DEFAULT_RETRYABLE_STATUSES;
use crate::storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Every way a pipeline request can fail, grouped the way callers branch on
/// them.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or unusable settings; the request is aborted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Not enough brand data to proceed; reported as a structured failure.
    #[error("{0}")]
    InsufficientData(String),

    #[error("{collaborator} request failed ({status}): {message}")]
    Upstream {
        collaborator: &'static str,
        status: u16,
        message: String,
    },

    #[error("{collaborator} credits exhausted (402): {message}")]
    Quota {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} returned malformed output: {message}")]
    Parse {
        collaborator: &'static str,
        message: String,
    },

    /// A success status whose body could not be read as a generation result.
    #[error("{collaborator} returned an empty or unreadable response: {message}")]
    EmptyResponse {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} transport failure: {message}")]
    Transport {
        collaborator: &'static str,
        message: String,
    },

    #[error("image generation finished without producing an image")]
    NoImageProduced,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("data store error: {0}")]
    Store(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// HTTP status the request handler answers with.
    ///
    /// Insufficient data answers 200 so callers branch on `success` instead
    /// of treating it as a transport failure.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Configuration(_) => 500,
            Self::InsufficientData(_) => 200,
            Self::Upstream { status, .. } => *status,
            Self::Quota { .. } => 402,
            Self::Parse { .. } | Self::EmptyResponse { .. } | Self::NoImageProduced => 502,
            Self::Transport { .. } => 504,
            Self::Storage(_) | Self::Store(_) | Self::Render(_) | Self::Internal(_) => 500,
            Self::Lifecycle(_) => 409,
            Self::NotFound { .. } => 404,
        }
    }

    /// Transient under the default retry policy.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => DEFAULT_RETRYABLE_STATUSES.contains(status),
            Self::EmptyResponse { .. } | Self::NoImageProduced | Self::Transport { .. } => true,
            _ => false,
        }
    }

    /// Short machine-readable category for logs and responses.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InsufficientData(_) => "insufficient_data",
            Self::Upstream { .. } | Self::Transport { .. } => "upstream",
            Self::Quota { .. } => "quota",
            Self::Parse { .. } | Self::EmptyResponse { .. } | Self::NoImageProduced => "parse",
            Self::Storage(_) => "storage",
            Self::Lifecycle(_) => "lifecycle",
            Self::NotFound { .. } => "not_found",
            Self::Store(_) => "store",
            Self::Render(_) => "render",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use trendcast_contracts::content::LifecycleError;

    use super::PipelineError;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(PipelineError::Configuration("no key".into()).http_status(), 500);
        assert_eq!(
            PipelineError::InsufficientData("no references".into()).http_status(),
            200
        );
        assert_eq!(
            PipelineError::Quota {
                collaborator: "image",
                message: String::new()
            }
            .http_status(),
            402
        );
        assert_eq!(
            PipelineError::from(LifecycleError::MissingSchedule).category(),
            "lifecycle"
        );
    }
}
