use crate::env::{process_env, EnvLookup};
use async_trait::async_trait;
use crewdeck_core::{CrewError, CrewResult};
use std::collections::HashMap;
use std::env::VarError;
use std::sync::Arc;

/// Resolves provider credentials.
///
/// `Ok(None)` means "no credential configured"; `Err` means the lookup
/// itself failed.
#[async_trait]
pub trait ApiKeyProvider: Send + Sync {
    /// Key for `provider`, if one is configured.
    async fn get_provider_api_key(&self, provider: &str) -> CrewResult<Option<String>>;
}

/// Reads `<PROVIDER>_API_KEY` from the environment.
pub struct EnvApiKeyProvider {
    lookup: EnvLookup,
}

impl EnvApiKeyProvider {
    /// Create a provider reading the process environment.
    pub fn new() -> Self {
        Self {
            lookup: process_env(),
        }
    }

    /// Create a provider with a custom environment lookup.
    pub fn with_lookup(lookup: EnvLookup) -> Self {
        Self { lookup }
    }

    fn var_name(provider: &str) -> String {
        format!("{}_API_KEY", provider.to_ascii_uppercase())
    }
}

impl Default for EnvApiKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyProvider for EnvApiKeyProvider {
    async fn get_provider_api_key(&self, provider: &str) -> CrewResult<Option<String>> {
        let name = Self::var_name(provider);
        match (self.lookup)(&name) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
            Ok(_) | Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(CrewError::Credential(format!(
                "{name} is not valid unicode"
            ))),
        }
    }
}

/// Keys supplied directly, typically from the `[api_keys]` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticApiKeyProvider {
    keys: HashMap<String, String>,
}

impl StaticApiKeyProvider {
    /// Create a provider from `provider -> key` pairs. Provider names are case-insensitive.
    pub fn new(keys: HashMap<String, String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self { keys }
    }

    /// Number of configured keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key is configured.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl ApiKeyProvider for StaticApiKeyProvider {
    async fn get_provider_api_key(&self, provider: &str) -> CrewResult<Option<String>> {
        Ok(self
            .keys
            .get(&provider.to_ascii_lowercase())
            .filter(|v| !v.trim().is_empty())
            .cloned())
    }
}

/// Asks `primary` first and falls back to `secondary` when it has no key.
pub struct FallbackApiKeyProvider {
    primary: Arc<dyn ApiKeyProvider>,
    secondary: Arc<dyn ApiKeyProvider>,
}

impl FallbackApiKeyProvider {
    /// Create a provider that tries `primary` before `secondary`.
    pub fn new(primary: Arc<dyn ApiKeyProvider>, secondary: Arc<dyn ApiKeyProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ApiKeyProvider for FallbackApiKeyProvider {
    async fn get_provider_api_key(&self, provider: &str) -> CrewResult<Option<String>> {
        match self.primary.get_provider_api_key(provider).await? {
            Some(key) => Ok(Some(key)),
            None => self.secondary.get_provider_api_key(provider).await,
        }
    }
}
