use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{
    GeneratedImage, ImageGenerationClient, ImageGenerationRequest, ImageGenerationResponse,
    TextGenerationClient, TextGenerationRequest, IMAGE_COLLABORATOR,
};
use crate::error::{PipelineError, PipelineResult};

/// Offline image client: a solid tile whose color is derived from the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunImageClient;

impl DryrunImageClient {
    fn dims(aspect_ratio: Option<&str>) -> (u32, u32) {
        match aspect_ratio {
            Some("9:16") => (108, 192),
            Some("1:1") => (108, 108),
            _ => (108, 135),
        }
    }
}

impl ImageGenerationClient for DryrunImageClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> PipelineResult<ImageGenerationResponse> {
        let (width, height) = Self::dims(request.aspect_ratio.as_deref());
        let (r, g, b) = color_from_prompt(request.prompt(), request.reference_count());
        let tile = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
        let mut bytes = Cursor::new(Vec::new());
        tile.write_to(&mut bytes, ImageFormat::Png)
            .map_err(|err| PipelineError::EmptyResponse {
                collaborator: IMAGE_COLLABORATOR,
                message: format!("dryrun encode failed: {err}"),
            })?;

        let mut provider_request = Map::new();
        provider_request.insert("endpoint".to_string(), json!("dryrun"));
        provider_request.insert("model".to_string(), json!(request.model));
        provider_request.insert("references".to_string(), json!(request.reference_count()));
        let mut provider_response = Map::new();
        provider_response.insert("status".to_string(), json!("ok"));
        provider_response.insert("size".to_string(), json!(format!("{width}x{height}")));

        Ok(ImageGenerationResponse {
            image: Some(GeneratedImage {
                bytes: bytes.into_inner(),
                mime_type: "image/png".to_string(),
            }),
            provider_request,
            provider_response,
        })
    }
}

/// Offline text client returning well-formed copy for the requested slide
/// count, wrapped in chatter the way real models often answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunTextClient;

impl TextGenerationClient for DryrunTextClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete(&self, request: &TextGenerationRequest) -> PipelineResult<String> {
        let count = request.expected_slides.max(1);
        let roles = ["cover", "context", "insight", "bullets", "closing"];
        let slides: Vec<Value> = (0..count)
            .map(|idx| {
                let role = if count == 1 {
                    "cover"
                } else if idx + 1 == count {
                    "closing"
                } else {
                    roles[idx.min(roles.len() - 2)]
                };
                json!({
                    "role": role,
                    "template": Value::Null,
                    "headline": format!("Slide {} headline", idx + 1),
                    "body": "Draft body copy generated offline.",
                    "bullets": if role == "bullets" { json!(["First point", "Second point"]) } else { json!([]) },
                    "illustrationPrompt": "abstract editorial shapes, soft light",
                })
            })
            .collect();
        let body = json!({
            "title": "Offline draft",
            "caption": "Generated without a text model.",
            "hashtags": ["trendcast", "#draft"],
            "slides": slides,
        });
        Ok(format!("Here is your content:\n{body}\nGood luck!"))
    }
}

fn color_from_prompt(prompt: &str, salt: usize) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update((salt as u64).to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use super::{DryrunImageClient, DryrunTextClient};
    use crate::providers::{
        ContentPart, ImageGenerationClient, ImageGenerationRequest, TextGenerationClient,
        TextGenerationRequest,
    };

    #[test]
    fn dryrun_image_is_deterministic_png() -> anyhow::Result<()> {
        let request = ImageGenerationRequest {
            model: "dryrun-image".to_string(),
            parts: vec![ContentPart::Text("harbor".to_string())],
            aspect_ratio: Some("9:16".to_string()),
        };
        let first = DryrunImageClient.generate(&request)?;
        let second = DryrunImageClient.generate(&request)?;
        let first = first.image.unwrap_or_else(|| panic!("image expected"));
        assert_eq!(Some(first.clone()), second.image);
        let decoded = image::load_from_memory(&first.bytes)?;
        assert_eq!((decoded.width(), decoded.height()), (108, 192));
        Ok(())
    }

    #[test]
    fn dryrun_text_embeds_requested_slide_count() -> anyhow::Result<()> {
        let raw = DryrunTextClient.complete(&TextGenerationRequest {
            model: "dryrun-text".to_string(),
            system: String::new(),
            user: String::new(),
            expected_slides: 5,
        })?;
        assert!(raw.starts_with("Here is"));
        let start = raw.find('{').unwrap_or(0);
        let end = raw.rfind('}').unwrap_or(0);
        let parsed: serde_json::Value = serde_json::from_str(&raw[start..=end])?;
        assert_eq!(parsed["slides"].as_array().map(Vec::len), Some(5));
        assert_eq!(parsed["slides"][4]["role"], "closing");
        Ok(())
    }
}
