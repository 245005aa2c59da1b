use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
/// Hard ceiling on reference images sent in one synthesis request.
pub const MAX_REFERENCES_CEILING: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    Http {
        base_url: String,
        bucket: String,
        service_key: String,
    },
}

/// Engine settings, read once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: Option<String>,
    pub text_model: Option<String>,
    pub safe_area_top: u32,
    pub safe_area_bottom: u32,
    pub max_references: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub storage: StorageConfig,
    pub receipts_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Builds the config from any key lookup; unset or unparsable values
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let storage = match (
            lookup("TRENDCAST_STORAGE_URL"),
            lookup("TRENDCAST_STORAGE_KEY"),
        ) {
            (Some(base_url), Some(service_key)) => StorageConfig::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                bucket: lookup("TRENDCAST_STORAGE_BUCKET")
                    .unwrap_or_else(|| "generated-images".to_string()),
                service_key,
            },
            _ => StorageConfig::Local {
                root: lookup("TRENDCAST_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("trendcast-media")),
                public_base_url: lookup("TRENDCAST_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| "file://trendcast-media".to_string()),
            },
        };

        Self {
            api_key: lookup("OPENROUTER_API_KEY").or_else(|| lookup("TRENDCAST_API_KEY")),
            api_base: lookup("OPENROUTER_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            image_model: lookup("TRENDCAST_IMAGE_MODEL"),
            text_model: lookup("TRENDCAST_TEXT_MODEL"),
            safe_area_top: number("TRENDCAST_SAFE_AREA_TOP", 220) as u32,
            safe_area_bottom: number("TRENDCAST_SAFE_AREA_BOTTOM", 260) as u32,
            max_references: (number("TRENDCAST_MAX_REFERENCES", MAX_REFERENCES_CEILING as u64)
                as usize)
                .clamp(1, MAX_REFERENCES_CEILING),
            batch_size: (number("TRENDCAST_BATCH_SIZE", 2) as usize).max(1),
            batch_delay: Duration::from_millis(number("TRENDCAST_BATCH_DELAY_MS", 1500)),
            request_timeout: Duration::from_secs(number("TRENDCAST_REQUEST_TIMEOUT_S", 120).max(5)),
            retry: RetryPolicy::default(),
            storage,
            receipts_dir: lookup("TRENDCAST_RECEIPTS_DIR").map(PathBuf::from),
        }
    }

    pub fn require_api_key(&self) -> PipelineResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| {
                PipelineError::Configuration(
                    "OPENROUTER_API_KEY or TRENDCAST_API_KEY not set".to_string(),
                )
            })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{EngineConfig, StorageConfig, DEFAULT_API_BASE};
    use crate::error::PipelineError;

    fn config(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config(&[]);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.max_references, 8);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.batch_delay, Duration::from_millis(1500));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(matches!(config.storage, StorageConfig::Local { .. }));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = config(&[]).require_api_key().err();
        assert!(matches!(err, Some(PipelineError::Configuration(_))));
        assert_eq!(
            config(&[("TRENDCAST_API_KEY", "k")]).require_api_key().ok(),
            Some("k")
        );
    }

    #[test]
    fn reference_cap_is_clamped_to_ceiling() {
        assert_eq!(config(&[("TRENDCAST_MAX_REFERENCES", "20")]).max_references, 8);
        assert_eq!(config(&[("TRENDCAST_MAX_REFERENCES", "0")]).max_references, 1);
        assert_eq!(config(&[("TRENDCAST_MAX_REFERENCES", "x")]).max_references, 8);
    }

    #[test]
    fn http_storage_needs_url_and_key() {
        let config = config(&[
            ("TRENDCAST_STORAGE_URL", "https://store.example/"),
            ("TRENDCAST_STORAGE_KEY", "secret"),
        ]);
        assert_eq!(
            config.storage,
            StorageConfig::Http {
                base_url: "https://store.example".to_string(),
                bucket: "generated-images".to_string(),
                service_key: "secret".to_string(),
            }
        );
    }
}
