//! Image synthesis: one retried collaborator call, one upload, one debug
//! record per slide.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use trendcast_contracts::references::ReferenceSet;
use trendcast_contracts::runs::receipts::{
    build_receipt, write_receipt, GenerationDebug, ReceiptRequest,
};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::providers::{
    ContentPart, GeneratedImage, ImageGenerationClient, ImageGenerationRequest,
    ImageGenerationResponse,
};
use crate::retry::RetryPolicy;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub content_id: Uuid,
    pub slide_index: usize,
    pub prompt: String,
    pub references: ReferenceSet,
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub slide_index: usize,
    pub image_url: String,
    pub storage_key: String,
    pub debug: GenerationDebug,
}

pub struct ImageSynthesizer<'a> {
    client: &'a dyn ImageGenerationClient,
    storage: &'a dyn ObjectStorage,
    retry: RetryPolicy,
    model: String,
    receipts_dir: Option<PathBuf>,
}

impl<'a> ImageSynthesizer<'a> {
    pub fn new(
        client: &'a dyn ImageGenerationClient,
        storage: &'a dyn ObjectStorage,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            storage,
            retry: RetryPolicy::default(),
            model: model.into(),
            receipts_dir: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_receipts_dir(mut self, receipts_dir: Option<PathBuf>) -> Self {
        self.receipts_dir = receipts_dir;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates, uploads and describes one image.
    ///
    /// Nothing is persisted on failure; an upload failure after a successful
    /// generation fails the slide.
    pub fn synthesize(&self, request: &SynthesisRequest) -> PipelineResult<SynthesisOutcome> {
        let generation_request = self.generation_request(request);
        let started = Instant::now();
        let label = format!("slide_image[{}]", request.slide_index);
        let attempted = self.retry.run(&label, |attempt| {
            tracing::debug!(
                content_id = %request.content_id,
                slide_index = request.slide_index,
                attempt,
                references = generation_request.reference_count(),
                "requesting image"
            );
            let response = self.client.generate(&generation_request)?;
            require_image(response)
        })?;
        let image_generation_ms = started.elapsed().as_millis() as u64;
        let (image, response) = attempted.value;

        let storage_key = format!(
            "{}/{}-{}.{}",
            request.content_id,
            request.slide_index,
            Utc::now().timestamp_millis(),
            image.extension()
        );
        let mime_type = image.mime_type.clone();
        let image_url = self.storage.upload(&storage_key, &mime_type, image.bytes)?;

        let debug = GenerationDebug {
            fallback_level: request.references.fallback_level,
            references_used_count: request.references.len(),
            image_generation_ms,
            model: self.model.clone(),
            attempts: attempted.attempts,
            generated_at: Utc::now(),
        };
        let fallback_level = debug.fallback_level.as_str();
        tracing::info!(
            content_id = %request.content_id,
            slide_index = request.slide_index,
            storage = self.storage.name(),
            attempts = attempted.attempts,
            fallback_level,
            image_generation_ms,
            "slide image stored"
        );

        self.record_receipt(request, &storage_key, &debug, &response, &image_url);
        Ok(SynthesisOutcome {
            slide_index: request.slide_index,
            image_url,
            storage_key,
            debug,
        })
    }

    /// Runs `requests` in batches of `batch_size`, sleeping `batch_delay`
    /// between batches. Results come back in request order; a failed slide
    /// never stops its siblings.
    pub fn synthesize_batch(
        &self,
        requests: &[SynthesisRequest],
        batch_size: usize,
        batch_delay: Duration,
    ) -> Vec<PipelineResult<SynthesisOutcome>> {
        let mut results = Vec::with_capacity(requests.len());
        for (batch_index, batch) in requests.chunks(batch_size.max(1)).enumerate() {
            if batch_index > 0 && !batch_delay.is_zero() {
                thread::sleep(batch_delay);
            }
            let outcomes: Vec<PipelineResult<SynthesisOutcome>> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|request| scope.spawn(move || self.synthesize(request)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(PipelineError::Internal(
                                "image synthesis worker panicked".to_string(),
                            ))
                        })
                    })
                    .collect()
            });
            results.extend(outcomes);
        }
        results
    }

    fn generation_request(&self, request: &SynthesisRequest) -> ImageGenerationRequest {
        let mut parts: Vec<ContentPart> = request
            .references
            .urls
            .iter()
            .cloned()
            .map(ContentPart::ImageUrl)
            .collect();
        parts.push(ContentPart::Text(request.prompt.clone()));
        ImageGenerationRequest {
            model: self.model.clone(),
            parts,
            aspect_ratio: request.aspect_ratio.clone(),
        }
    }

    fn record_receipt(
        &self,
        request: &SynthesisRequest,
        storage_key: &str,
        debug: &GenerationDebug,
        response: &ImageGenerationResponse,
        image_url: &str,
    ) {
        let Some(dir) = self.receipts_dir.as_ref() else {
            return;
        };
        let receipt_request = ReceiptRequest {
            content_id: request.content_id,
            slide_index: request.slide_index,
            prompt: request.prompt.clone(),
            reference_urls: request.references.urls.clone(),
            storage_path: storage_key.to_string(),
        };
        let payload = build_receipt(
            &receipt_request,
            debug,
            &response.provider_request,
            &response.provider_response,
            image_url,
        );
        let path = dir.join(request.content_id.to_string()).join(format!(
            "receipt-slide-{}-{}.json",
            request.slide_index,
            debug.generated_at.timestamp_millis()
        ));
        if let Err(err) = write_receipt(&path, &payload) {
            tracing::warn!(path = %path.display(), error = %err, "failed to write receipt");
        }
    }
}

fn require_image(
    mut response: ImageGenerationResponse,
) -> PipelineResult<(GeneratedImage, ImageGenerationResponse)> {
    match response.image.take() {
        Some(image) => Ok((image, response)),
        None => Err(PipelineError::NoImageProduced),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use trendcast_contracts::references::{FallbackLevel, ReferenceSet};
    use uuid::Uuid;

    use super::{ImageSynthesizer, SynthesisRequest};
    use crate::error::{PipelineError, PipelineResult};
    use crate::providers::{
        GeneratedImage, ImageGenerationClient, ImageGenerationRequest, ImageGenerationResponse,
    };
    use crate::retry::RetryPolicy;
    use crate::storage::{LocalObjectStorage, ObjectStorage, StorageError, StorageResult};

    struct ScriptedClient {
        script: Mutex<VecDeque<PipelineResult<Option<GeneratedImage>>>>,
        calls: AtomicUsize,
        last_reference_count: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(script: Vec<PipelineResult<Option<GeneratedImage>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                last_reference_count: AtomicUsize::new(0),
            }
        }
    }

    impl ImageGenerationClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(
            &self,
            request: &ImageGenerationRequest,
        ) -> PipelineResult<ImageGenerationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_reference_count
                .store(request.reference_count(), Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .map_err(|_| PipelineError::Internal("poisoned".into()))?
                .pop_front()
                .unwrap_or_else(|| Ok(Some(png())));
            Ok(ImageGenerationResponse {
                image: next?,
                ..ImageGenerationResponse::default()
            })
        }
    }

    struct FailingStorage;

    impl ObjectStorage for FailingStorage {
        fn name(&self) -> &str {
            "failing"
        }

        fn upload(&self, _key: &str, _content_type: &str, _data: Vec<u8>) -> StorageResult<String> {
            Err(StorageError::UploadFailed("bucket unavailable".to_string()))
        }
    }

    fn png() -> GeneratedImage {
        GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".to_string(),
        }
    }

    fn request(slide_index: usize, references: usize) -> SynthesisRequest {
        SynthesisRequest {
            content_id: Uuid::nil(),
            slide_index,
            prompt: "quiet harbor".to_string(),
            references: ReferenceSet {
                urls: (0..references)
                    .map(|n| format!("https://cdn.example/{n}.png"))
                    .collect(),
                fallback_level: FallbackLevel::BrandWide,
                matched: references,
            },
            aspect_ratio: Some("4:5".to_string()),
        }
    }

    fn rate_limited() -> PipelineResult<Option<GeneratedImage>> {
        Err(PipelineError::Upstream {
            collaborator: "image generation",
            status: 429,
            message: "slow down".to_string(),
        })
    }

    #[test]
    fn uploads_under_content_and_slide_key() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = LocalObjectStorage::new(temp.path(), "https://media.example");
        let client = ScriptedClient::new(vec![rate_limited(), Ok(Some(png()))]);
        let synth = ImageSynthesizer::new(&client, &storage, "dryrun-image")
            .with_retry(RetryPolicy::immediate())
            .with_receipts_dir(Some(temp.path().join("receipts")));

        let outcome = synth.synthesize(&request(2, 2))?;

        assert!(outcome
            .storage_key
            .starts_with(&format!("{}/2-", Uuid::nil())));
        assert!(outcome.storage_key.ends_with(".png"));
        assert_eq!(
            outcome.image_url,
            format!("https://media.example/{}", outcome.storage_key)
        );
        assert_eq!(outcome.debug.attempts, 2);
        assert_eq!(outcome.debug.references_used_count, 2);
        assert_eq!(outcome.debug.fallback_level, FallbackLevel::BrandWide);
        assert_eq!(outcome.debug.model, "dryrun-image");
        assert_eq!(client.last_reference_count.load(Ordering::SeqCst), 2);
        assert!(temp.path().join(&outcome.storage_key).exists());
        let receipts = std::fs::read_dir(temp.path().join("receipts").join(Uuid::nil().to_string()))?
            .count();
        assert_eq!(receipts, 1);
        Ok(())
    }

    #[test]
    fn persistent_rate_limit_stops_after_three_attempts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = LocalObjectStorage::new(temp.path(), "https://media.example");
        let client = ScriptedClient::new(vec![rate_limited(), rate_limited(), rate_limited(), rate_limited()]);
        let synth = ImageSynthesizer::new(&client, &storage, "m").with_retry(RetryPolicy::immediate());

        let result = synth.synthesize(&request(0, 0));

        assert!(matches!(result, Err(PipelineError::Upstream { status: 429, .. })));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn missing_image_is_retried_then_reported() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = LocalObjectStorage::new(temp.path(), "https://media.example");
        let client = ScriptedClient::new(vec![Ok(None), Ok(None), Ok(None)]);
        let synth = ImageSynthesizer::new(&client, &storage, "m").with_retry(RetryPolicy::immediate());

        assert!(matches!(
            synth.synthesize(&request(0, 0)),
            Err(PipelineError::NoImageProduced)
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[test]
    fn upload_failure_fails_the_slide() {
        let client = ScriptedClient::new(vec![Ok(Some(png()))]);
        let synth = ImageSynthesizer::new(&client, &FailingStorage, "m").with_retry(RetryPolicy::immediate());
        assert!(matches!(
            synth.synthesize(&request(0, 0)),
            Err(PipelineError::Storage(StorageError::UploadFailed(_)))
        ));
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = LocalObjectStorage::new(temp.path(), "https://media.example");
        let client = ScriptedClient::new(vec![Err(PipelineError::Quota {
            collaborator: "image generation",
            message: "no credits".to_string(),
        })]);
        let synth = ImageSynthesizer::new(&client, &storage, "m").with_retry(RetryPolicy::immediate());
        let requests: Vec<SynthesisRequest> = (0..5).map(|index| request(index, 1)).collect();

        let results = synth.synthesize_batch(&requests, 2, Duration::ZERO);

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|result| result.is_err()).count(), 1);
        for (index, result) in results.iter().enumerate() {
            if let Ok(outcome) = result {
                assert_eq!(outcome.slide_index, index);
            }
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
        Ok(())
    }
}
