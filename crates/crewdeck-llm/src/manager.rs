use crate::config::{LlmProvider, ModelConfig};
use crate::keys::ApiKeyProvider;
use async_trait::async_trait;
use crewdeck_core::{CrewError, CrewResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A resolved model, ready to be handed to the orchestration engine.
#[derive(Clone, PartialEq)]
pub struct LlmHandle {
    /// Model the handle refers to.
    pub config: ModelConfig,
    /// `None` for providers that need no key.
    pub api_key: Option<String>,
}

impl LlmHandle {
    /// Create a handle from a model config and its key.
    pub fn new(config: ModelConfig, api_key: Option<String>) -> Self {
        Self { config, api_key }
    }

    /// Provider-qualified model id, e.g. `openai/gpt-4o`.
    pub fn model(&self) -> String {
        self.config.qualified_id()
    }

    /// Provider serving the model.
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }
}

// Keys never end up in logs.
impl fmt::Debug for LlmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmHandle")
            .field("config", &self.config)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Builds model handles from model identifiers.
#[async_trait]
pub trait LlmManager: Send + Sync {
    /// Resolve `model` to a handle.
    async fn get_llm(&self, model: &str) -> CrewResult<LlmHandle>;
}

/// Catalog-backed [`LlmManager`].
///
/// Explicitly registered models win; anything else is resolved by inferring
/// the provider from the identifier. Providers that need a key fail when the
/// key provider has none.
pub struct ModelCatalog {
    models: HashMap<String, ModelConfig>,
    keys: Arc<dyn ApiKeyProvider>,
}

impl ModelCatalog {
    /// Create an empty catalog that looks keys up in `keys`.
    pub fn new(keys: Arc<dyn ApiKeyProvider>) -> Self {
        Self {
            models: HashMap::new(),
            keys,
        }
    }

    /// Register a model under an alias.
    pub fn register(&mut self, alias: impl Into<String>, config: ModelConfig) {
        self.models.insert(alias.into(), config);
    }

    /// Register several models at once.
    pub fn with_models(mut self, models: HashMap<String, ModelConfig>) -> Self {
        self.models.extend(models);
        self
    }

    /// Number of registered models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    fn lookup(&self, model: &str) -> CrewResult<ModelConfig> {
        if let Some(config) = self.models.get(model) {
            return Ok(config.clone());
        }

        let provider = LlmProvider::infer(model).ok_or_else(|| {
            CrewError::Llm(format!("cannot determine provider for model '{model}'"))
        })?;

        // Strip an explicit provider prefix; the provider knows the bare id.
        let model_id = match model.split_once('/') {
            Some((prefix, rest)) if prefix.parse::<LlmProvider>().is_ok() => rest,
            _ => model,
        };

        Ok(ModelConfig::new(provider, model_id))
    }
}

#[async_trait]
impl LlmManager for ModelCatalog {
    async fn get_llm(&self, model: &str) -> CrewResult<LlmHandle> {
        let model = model.trim();
        if model.is_empty() {
            return Err(CrewError::Llm("empty model identifier".to_string()));
        }

        let config = self.lookup(model)?;
        let api_key = self
            .keys
            .get_provider_api_key(config.provider.key_name())
            .await?;

        if api_key.is_none() && config.provider.requires_api_key() {
            return Err(CrewError::Llm(format!(
                "no API key configured for provider {}",
                config.provider
            )));
        }

        debug!(model = %config.qualified_id(), "Resolved model handle");
        Ok(LlmHandle::new(config, api_key))
    }
}
