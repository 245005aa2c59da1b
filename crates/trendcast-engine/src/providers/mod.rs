//! Clients for the image- and text-generation collaborators.
//!
//! Both speak the chat-completions shape. The transport is hidden behind
//! [`ImageGenerationClient`] and [`TextGenerationClient`] so the synthesizer
//! and copy generator never see HTTP.

mod dryrun;
mod openrouter;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Response as HttpResponse;
use serde_json::{json, Map, Value};

use crate::error::{PipelineError, PipelineResult};

pub use dryrun::{DryrunImageClient, DryrunTextClient};
pub use openrouter::{OpenRouterImageClient, OpenRouterTextClient};

pub const IMAGE_COLLABORATOR: &str = "image generation";
pub const TEXT_COLLABORATOR: &str = "text generation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    ImageUrl(String),
    Text(String),
}

impl ContentPart {
    pub fn to_json(&self) -> Value {
        match self {
            Self::ImageUrl(url) => json!({
                "type": "image_url",
                "image_url": { "url": url },
            }),
            Self::Text(text) => json!({
                "type": "text",
                "text": text,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerationRequest {
    pub model: String,
    /// Reference images first, prompt text last.
    pub parts: Vec<ContentPart>,
    pub aspect_ratio: Option<String>,
}

impl ImageGenerationRequest {
    pub fn reference_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, ContentPart::ImageUrl(_)))
            .count()
    }

    pub fn prompt(&self) -> &str {
        self.parts
            .iter()
            .rev()
            .find_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::ImageUrl(_) => None,
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageGenerationResponse {
    /// `None` when the collaborator answered successfully without an image.
    pub image: Option<GeneratedImage>,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
}

pub trait ImageGenerationClient: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ImageGenerationRequest) -> PipelineResult<ImageGenerationResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextGenerationRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub expected_slides: usize,
}

pub trait TextGenerationClient: Send + Sync {
    fn name(&self) -> &str;
    /// Returns the raw message content of the first choice.
    fn complete(&self, request: &TextGenerationRequest) -> PipelineResult<String>;
}

/// Maps a collaborator HTTP response to JSON or to the matching error.
pub(crate) fn response_json_or_error(
    collaborator: &'static str,
    response: HttpResponse,
) -> PipelineResult<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| PipelineError::Transport {
        collaborator,
        message: format!("response body read failed: {err}"),
    })?;
    if code == 402 {
        return Err(PipelineError::Quota {
            collaborator,
            message: truncate_text(&body, 512),
        });
    }
    if !status.is_success() {
        return Err(PipelineError::Upstream {
            collaborator,
            status: code,
            message: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|err| PipelineError::EmptyResponse {
        collaborator,
        message: format!("invalid JSON payload: {err}"),
    })
}

pub(crate) fn transport_error(collaborator: &'static str, err: reqwest::Error) -> PipelineError {
    PipelineError::Transport {
        collaborator,
        message: err.to_string(),
    }
}

/// Reads `choices[0].message.images[0].image_url.url`.
///
/// A missing field is a valid "no image" outcome; a present but undecodable
/// one is an unreadable response.
pub fn extract_chat_image(payload: &Value) -> PipelineResult<Option<GeneratedImage>> {
    let url = payload
        .pointer("/choices/0/message/images/0/image_url/url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let Some(url) = url else {
        return Ok(None);
    };
    decode_image_payload(url).map(Some)
}

/// Accepts a `data:` URL or bare base64.
pub fn decode_image_payload(raw: &str) -> PipelineResult<GeneratedImage> {
    let (mime_type, encoded) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest.split_once(',').ok_or_else(|| PipelineError::EmptyResponse {
                collaborator: IMAGE_COLLABORATOR,
                message: "data URL without payload".to_string(),
            })?;
            let mime = meta
                .split(';')
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or("image/png");
            (mime.to_string(), payload)
        }
        None => ("image/png".to_string(), raw),
    };
    let bytes = BASE64
        .decode(encoded.trim().as_bytes())
        .map_err(|err| PipelineError::EmptyResponse {
            collaborator: IMAGE_COLLABORATOR,
            message: format!("image base64 decode failed: {err}"),
        })?;
    if bytes.is_empty() {
        return Err(PipelineError::EmptyResponse {
            collaborator: IMAGE_COLLABORATOR,
            message: "image payload is empty".to_string(),
        });
    }
    Ok(GeneratedImage { bytes, mime_type })
}

/// Reads `choices[0].message.content`, joining text parts when the content
/// is an array.
pub fn extract_chat_text(payload: &Value) -> Option<String> {
    let content = payload.pointer("/choices/0/message/content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("");
            Some(joined)
        }
        _ => None,
    }
    .filter(|text| !text.trim().is_empty())
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use serde_json::json;

    use super::{
        decode_image_payload, extract_chat_image, extract_chat_text, ContentPart,
        ImageGenerationRequest, BASE64,
    };
    use crate::error::PipelineError;

    #[test]
    fn data_url_image_is_decoded_with_mime() {
        let encoded = BASE64.encode(b"jpegbytes");
        let payload = json!({
            "choices": [{"message": {"images": [{"image_url": {"url": format!("data:image/jpeg;base64,{encoded}")}}]}}]
        });
        let image = extract_chat_image(&payload)
            .unwrap_or_else(|err| panic!("{err}"))
            .unwrap_or_else(|| panic!("image expected"));
        assert_eq!(image.bytes, b"jpegbytes");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn missing_image_field_is_not_an_error() {
        let payload = json!({"choices": [{"message": {"content": "sorry"}}]});
        assert!(matches!(extract_chat_image(&payload), Ok(None)));
    }

    #[test]
    fn garbage_base64_is_an_unreadable_response() {
        assert!(matches!(
            decode_image_payload("data:image/png;base64,@@@"),
            Err(PipelineError::EmptyResponse { .. })
        ));
        assert!(matches!(
            decode_image_payload("data:image/png"),
            Err(PipelineError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn text_content_accepts_string_or_parts() {
        let plain = json!({"choices": [{"message": {"content": "{\"a\":1}"}}]});
        assert_eq!(extract_chat_text(&plain).as_deref(), Some("{\"a\":1}"));
        let parts = json!({"choices": [{"message": {"content": [{"type": "text", "text": "ab"}, {"type": "text", "text": "c"}]}}]});
        assert_eq!(extract_chat_text(&parts).as_deref(), Some("abc"));
        assert_eq!(extract_chat_text(&json!({"choices": []})), None);
    }

    #[test]
    fn request_reports_references_and_prompt() {
        let request = ImageGenerationRequest {
            model: "m".to_string(),
            parts: vec![
                ContentPart::ImageUrl("https://a".to_string()),
                ContentPart::ImageUrl("https://b".to_string()),
                ContentPart::Text("prompt".to_string()),
            ],
            aspect_ratio: None,
        };
        assert_eq!(request.reference_count(), 2);
        assert_eq!(request.prompt(), "prompt");
    }
}
