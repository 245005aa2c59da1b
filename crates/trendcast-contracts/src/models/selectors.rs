use super::registry::{ModelCapability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Honors `requested` when it exists and supports `capability`; otherwise
    /// falls back to the registry default and says why.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: ModelCapability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(name) => {
                if let Some(model) = self.registry.ensure(name, capability) {
                    return Ok(ModelSelection {
                        model,
                        requested: Some(name.to_string()),
                        fallback_reason: None,
                    });
                }
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }
            None => "No model specified; using default.".to_string(),
        };

        let Some(model) = self.registry.by_capability(capability).into_iter().next() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{ModelCapability, ModelRegistry, ModelSpec};

    fn spec(name: &str, capabilities: &[ModelCapability]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            gateway: "dryrun".to_string(),
            capabilities: capabilities.to_vec(),
            max_reference_images: None,
        }
    }

    fn registry(specs: Vec<ModelSpec>) -> ModelRegistry {
        let mut models = IndexMap::new();
        for spec in specs {
            models.insert(spec.name.clone(), spec);
        }
        ModelRegistry::new(Some(models))
    }

    #[test]
    fn requested_model_is_used_when_capable() {
        let selector = ModelSelector::new(Some(registry(vec![
            spec("a", &[ModelCapability::Image]),
            spec("b", &[ModelCapability::Image]),
        ])));
        let selection = selector
            .select(Some("b"), ModelCapability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "b");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn text_model_requested_for_image_falls_back() {
        let selector = ModelSelector::new(Some(registry(vec![
            spec("writer", &[ModelCapability::Text]),
            spec("painter", &[ModelCapability::Image]),
        ])));
        let selection = selector
            .select(Some("writer"), ModelCapability::Image)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "painter");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'writer' unavailable for capability 'image'.")
        );
    }

    #[test]
    fn blank_request_uses_default_with_explanation() {
        let selection = ModelSelector::new(None)
            .select(Some("  "), ModelCapability::Text)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(selection.model.name, "google/gemini-2.5-flash");
        assert_eq!(selection.requested, None);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn missing_capability_is_an_error() {
        let err = ModelSelector::new(Some(registry(vec![spec("writer", &[ModelCapability::Text])])))
            .select(None, ModelCapability::Image)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'image'.");
    }
}
