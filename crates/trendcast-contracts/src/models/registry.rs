use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelCapability {
    /// Produces bitmaps from multimodal prompts.
    Image,
    /// Produces slide copy as JSON text.
    Text,
}

impl ModelCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ModelCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub gateway: String,
    pub capabilities: Vec<ModelCapability>,
    /// Upper bound on reference images the model accepts in one request.
    pub max_reference_images: Option<usize>,
}

impl ModelSpec {
    pub fn supports(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Ordered catalogue; the first capable entry is the default for that
/// capability.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: ModelCapability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: ModelCapability) -> Option<ModelSpec> {
        self.get(name)
            .filter(|model| model.supports(capability))
            .cloned()
    }

    /// Only the entries served by `gateway`, order kept.
    pub fn for_gateway(&self, gateway: &str) -> Self {
        Self {
            models: self
                .models
                .iter()
                .filter(|(_, model)| model.gateway == gateway)
                .map(|(name, model)| (name.clone(), model.clone()))
                .collect(),
        }
    }
}

pub const DRYRUN_GATEWAY: &str = "dryrun";

fn default_models() -> IndexMap<String, ModelSpec> {
    use ModelCapability::{Image, Text};

    let rows: [(&str, &str, &[ModelCapability], Option<usize>); 6] = [
        ("google/gemini-2.5-flash-image-preview", "openrouter", &[Image], Some(8)),
        ("google/gemini-3-pro-image-preview", "openrouter", &[Image], Some(8)),
        ("google/gemini-2.5-flash", "openrouter", &[Text], None),
        ("openai/gpt-4o-mini", "openrouter", &[Text], None),
        ("dryrun-image", DRYRUN_GATEWAY, &[Image], Some(8)),
        ("dryrun-text", DRYRUN_GATEWAY, &[Text], None),
    ];

    rows.into_iter()
        .map(|(name, gateway, capabilities, max_reference_images)| {
            (
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    gateway: gateway.to_string(),
                    capabilities: capabilities.to_vec(),
                    max_reference_images,
                },
            )
        })
        .collect()
}
