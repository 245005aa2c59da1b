use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Map, Value};

use super::{
    extract_chat_image, extract_chat_text, response_json_or_error, transport_error,
    ImageGenerationClient, ImageGenerationRequest, ImageGenerationResponse,
    TextGenerationClient, TextGenerationRequest, IMAGE_COLLABORATOR, TEXT_COLLABORATOR,
};
use crate::config::EngineConfig;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
struct Gateway {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl Gateway {
    fn from_config(config: &EngineConfig) -> PipelineResult<Self> {
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.require_api_key()?.to_string(),
            timeout: config.request_timeout,
            http: HttpClient::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn post(&self, collaborator: &'static str, payload: &Value) -> PipelineResult<Value> {
        let response = self
            .http
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| transport_error(collaborator, err))?;
        response_json_or_error(collaborator, response)
    }
}

/// Multimodal image generation over the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterImageClient {
    gateway: Gateway,
}

impl OpenRouterImageClient {
    pub fn new(config: &EngineConfig) -> PipelineResult<Self> {
        Ok(Self {
            gateway: Gateway::from_config(config)?,
        })
    }

    pub fn build_payload(request: &ImageGenerationRequest) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(request.model.clone()));
        payload.insert(
            "messages".to_string(),
            json!([{
                "role": "user",
                "content": request.parts.iter().map(|part| part.to_json()).collect::<Vec<_>>(),
            }]),
        );
        payload.insert("modalities".to_string(), json!(["image", "text"]));
        if let Some(ratio) = request.aspect_ratio.as_deref() {
            payload.insert("image_config".to_string(), json!({ "aspect_ratio": ratio }));
        }
        Value::Object(payload)
    }
}

impl ImageGenerationClient for OpenRouterImageClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> PipelineResult<ImageGenerationResponse> {
        let payload = Self::build_payload(request);
        let response_payload = self.gateway.post(IMAGE_COLLABORATOR, &payload)?;
        let image = extract_chat_image(&response_payload)?;

        let mut provider_request = Map::new();
        provider_request.insert("endpoint".to_string(), Value::String(self.gateway.endpoint()));
        provider_request.insert("payload".to_string(), payload);
        let mut provider_response = Map::new();
        for key in ["id", "model", "usage"] {
            provider_response.insert(
                key.to_string(),
                response_payload.get(key).cloned().unwrap_or(Value::Null),
            );
        }
        provider_response.insert(
            "finish_reason".to_string(),
            response_payload
                .pointer("/choices/0/finish_reason")
                .cloned()
                .unwrap_or(Value::Null),
        );

        Ok(ImageGenerationResponse {
            image,
            provider_request,
            provider_response,
        })
    }
}

/// JSON copy generation over the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterTextClient {
    gateway: Gateway,
}

impl OpenRouterTextClient {
    pub fn new(config: &EngineConfig) -> PipelineResult<Self> {
        Ok(Self {
            gateway: Gateway::from_config(config)?,
        })
    }
}

impl TextGenerationClient for OpenRouterTextClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn complete(&self, request: &TextGenerationRequest) -> PipelineResult<String> {
        let payload = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": 0.7,
        });
        let response_payload = self.gateway.post(TEXT_COLLABORATOR, &payload)?;
        extract_chat_text(&response_payload).ok_or_else(|| PipelineError::Parse {
            collaborator: TEXT_COLLABORATOR,
            message: "response has no message content".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::OpenRouterImageClient;
    use crate::config::EngineConfig;
    use crate::error::PipelineError;
    use crate::providers::{ContentPart, ImageGenerationRequest};

    #[test]
    fn client_requires_credentials() {
        let err = OpenRouterImageClient::new(&EngineConfig::default()).err();
        assert!(matches!(err, Some(PipelineError::Configuration(_))));
    }

    #[test]
    fn payload_sends_references_before_prompt() {
        let request = ImageGenerationRequest {
            model: "google/gemini-2.5-flash-image-preview".to_string(),
            parts: vec![
                ContentPart::ImageUrl("https://cdn.example/ref.png".to_string()),
                ContentPart::Text("background only".to_string()),
            ],
            aspect_ratio: Some("4:5".to_string()),
        };
        let payload = OpenRouterImageClient::build_payload(&request);
        let content = &payload["messages"][0]["content"];
        assert_eq!(content[0]["type"], json!("image_url"));
        assert_eq!(content[0]["image_url"]["url"], json!("https://cdn.example/ref.png"));
        assert_eq!(content[1]["text"], json!("background only"));
        assert_eq!(payload["modalities"], json!(["image", "text"]));
        assert_eq!(payload["image_config"]["aspect_ratio"], json!("4:5"));
    }
}
