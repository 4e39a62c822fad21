use indexmap::IndexMap;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub capabilities: Vec<String>,
    /// Upper bound the model accepts for `maxOutputTokens`.
    pub max_output_tokens: u32,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Models the assistant knows how to talk to, in preference order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    /// Accepts both bare names and `models/…` resource names.
    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim().trim_start_matches("models/"))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, capabilities: &[&str], max_output: u32| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
                max_output_tokens: max_output,
            },
        );
    };

    insert(DEFAULT_MODEL, &["text", "vision"], 8192);
    insert("gemini-2.0-flash-lite", &["text", "vision"], 8192);
    insert("gemini-2.5-flash", &["text", "vision"], 65_536);
    insert("gemini-2.5-pro", &["text", "vision"], 65_536);
    insert("gemini-1.5-flash", &["text", "vision"], 8192);
    insert("text-embedding-004", &["embedding"], 0);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_leads_with_default_model() {
        let registry = ModelRegistry::new(None);
        let vision = registry.by_capability("vision");
        assert_eq!(vision.first().map(|model| model.name.as_str()), Some(DEFAULT_MODEL));
        assert!(vision.iter().all(|model| model.max_output_tokens >= 8192));
    }

    #[test]
    fn ensure_accepts_resource_style_names() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure("models/gemini-2.5-flash", "vision").is_some());
        assert!(registry.ensure("text-embedding-004", "vision").is_none());
        assert!(registry.ensure("gpt-4o", "text").is_none());
        assert_eq!(
            registry.get(" models/gemini-2.5-pro").map(|model| model.max_output_tokens),
            Some(65_536)
        );
    }
}
