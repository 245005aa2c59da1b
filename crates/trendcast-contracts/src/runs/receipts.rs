use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::references::FallbackLevel;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Per-image diagnostics returned to the caller alongside the image URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationDebug {
    #[serde(rename = "fallbackLevel")]
    pub fallback_level: FallbackLevel,
    #[serde(rename = "referencesUsedCount")]
    pub references_used_count: usize,
    pub image_generation_ms: u64,
    pub model: String,
    pub attempts: u32,
    pub generated_at: DateTime<Utc>,
}

/// What was asked of the image collaborator for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRequest {
    pub content_id: Uuid,
    pub slide_index: usize,
    pub prompt: String,
    pub reference_urls: Vec<String>,
    pub storage_path: String,
}

pub fn build_receipt(
    request: &ReceiptRequest,
    debug: &GenerationDebug,
    provider_request: &Map<String, Value>,
    provider_response: &Map<String, Value>,
    image_url: &str,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "request".to_string(),
        sanitize_payload(&serde_json::to_value(request).unwrap_or(Value::Null)),
    );
    root.insert(
        "debug".to_string(),
        serde_json::to_value(debug).unwrap_or(Value::Null),
    );
    root.insert(
        "provider_request".to_string(),
        sanitize_payload(&Value::Object(provider_request.clone())),
    );
    root.insert(
        "provider_response".to_string(),
        sanitize_payload(&Value::Object(provider_response.clone())),
    );
    root.insert("image_url".to_string(), Value::String(image_url.to_string()));
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

/// Strips embedded image payloads so receipts stay small and readable.
fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::String(raw) if raw.starts_with("data:") => {
            Value::String("<omitted data url>".to_string())
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(lowered.as_str(), "b64_json" | "image_bytes" | "data") {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}
