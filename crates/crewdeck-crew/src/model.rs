//! Model and credential selection for crew assembly.
//!
//! Behaviour differs between a standard deployment and the managed hosting
//! platform: on the platform a default model always exists, and engines
//! that insist on an OpenAI-compatible credential get a placeholder when
//! none is configured. Credentials are returned to the caller and travel
//! in the crew blueprint; the process environment is never touched.

use crewdeck_llm::{ApiKeyProvider, LlmHandle, LlmManager, PlatformDetector};
use std::fmt;
use tracing::{debug, info, warn};

/// Provider whose credential the engine validates at construction time.
pub const ENGINE_CREDENTIAL_PROVIDER: &str = "openai";

/// Where a [`Credential`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Supplied by the key provider.
    Configured,
    /// Stand-in that only satisfies engine-side validation.
    Placeholder,
}

/// A provider credential for the engine. `Debug` redacts the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Provider the credential belongs to.
    pub provider: String,
    /// Secret value.
    pub value: String,
    /// Where the value came from.
    pub source: CredentialSource,
}

impl Credential {
    /// True for the stand-in credential.
    pub fn is_placeholder(&self) -> bool {
        self.source == CredentialSource::Placeholder
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Platform check that never fails: errors count as "not managed".
pub fn detect_managed(detector: &dyn PlatformDetector) -> bool {
    match detector.is_managed_environment() {
        Ok(managed) => managed,
        Err(e) => {
            warn!(error = %e, "Enhanced auth not available for crew preparation");
            false
        }
    }
}

async fn try_llm(llm: &dyn LlmManager, model: &str) -> Option<LlmHandle> {
    match llm.get_llm(model).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Could not create LLM for model {model}: {e}");
            None
        }
    }
}

/// Pick the crew-level model handle.
///
/// `None` means the engine applies its own default.
pub async fn resolve_crew_model(
    configured: Option<&str>,
    managed: bool,
    detector: &dyn PlatformDetector,
    llm: &dyn LlmManager,
) -> Option<LlmHandle> {
    let configured = configured.map(str::trim).filter(|m| !m.is_empty());

    match configured {
        Some(model) => {
            if let Some(handle) = try_llm(llm, model).await {
                info!(model = %handle.model(), "Using configured model for crew");
                return Some(handle);
            }
            if !managed {
                return None;
            }
            let fallback = detector.default_model();
            warn!(model = %fallback, "Falling back to managed platform model in Apps environment");
            try_llm(llm, fallback).await
        }
        None if managed => {
            let default = detector.default_model();
            info!(model = %default, "No model configured, using managed platform default");
            try_llm(llm, default).await
        }
        None => {
            debug!("No model configured, leaving model selection to the engine");
            None
        }
    }
}

/// Credential forwarded to the engine. Only the managed platform needs one.
pub async fn resolve_credential(
    managed: bool,
    keys: &dyn ApiKeyProvider,
    placeholder: &str,
) -> Option<Credential> {
    if !managed {
        return None;
    }

    match keys.get_provider_api_key(ENGINE_CREDENTIAL_PROVIDER).await {
        Ok(Some(value)) => {
            info!("OpenAI API key is configured, keeping it for the engine");
            Some(Credential {
                provider: ENGINE_CREDENTIAL_PROVIDER.to_string(),
                value,
                source: CredentialSource::Configured,
            })
        }
        Ok(None) => {
            info!("No OpenAI API key configured, using placeholder credential for engine validation");
            Some(Credential {
                provider: ENGINE_CREDENTIAL_PROVIDER.to_string(),
                value: placeholder.to_string(),
                source: CredentialSource::Placeholder,
            })
        }
        Err(e) => {
            warn!("Error checking OpenAI API key configuration: {e}");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crewdeck_core::{CrewError, CrewResult};
    use crewdeck_llm::{LlmProvider, ModelConfig, StaticApiKeyProvider};
    use std::collections::HashMap;

    struct Platform {
        managed: CrewResult<bool>,
    }

    impl PlatformDetector for Platform {
        fn is_managed_environment(&self) -> CrewResult<bool> {
            match &self.managed {
                Ok(v) => Ok(*v),
                Err(_) => Err(CrewError::Platform("no auth context".into())),
            }
        }

        fn default_model(&self) -> &str {
            "databricks-llama-4-maverick"
        }
    }

    /// Accepts only the listed models.
    struct Llms(Vec<&'static str>);

    #[async_trait]
    impl LlmManager for Llms {
        async fn get_llm(&self, model: &str) -> CrewResult<LlmHandle> {
            if self.0.iter().any(|m| *m == model) {
                Ok(LlmHandle::new(
                    ModelConfig::new(LlmProvider::Databricks, model),
                    None,
                ))
            } else {
                Err(CrewError::Llm(format!("unknown model {model}")))
            }
        }
    }

    struct BrokenKeys;

    #[async_trait]
    impl ApiKeyProvider for BrokenKeys {
        async fn get_provider_api_key(&self, _provider: &str) -> CrewResult<Option<String>> {
            Err(CrewError::Credential("vault unreachable".into()))
        }
    }

    #[test]
    fn test_detection_error_means_standard() {
        let p = Platform {
            managed: Err(CrewError::Platform(String::new())),
        };
        assert!(!detect_managed(&p));
    }

    #[tokio::test]
    async fn test_configured_model_used() {
        let p = Platform { managed: Ok(false) };
        let handle = resolve_crew_model(Some("gpt-4"), false, &p, &Llms(vec!["gpt-4"])).await;
        assert_eq!(handle.unwrap().config.model_id, "gpt-4");
    }

    #[tokio::test]
    async fn test_failed_model_falls_back_on_platform() {
        let p = Platform { managed: Ok(true) };
        let llms = Llms(vec!["databricks-llama-4-maverick"]);
        let handle = resolve_crew_model(Some("gpt-4"), true, &p, &llms).await;
        assert_eq!(handle.unwrap().config.model_id, "databricks-llama-4-maverick");
    }

    #[tokio::test]
    async fn test_failed_model_without_platform_uses_engine_default() {
        let p = Platform { managed: Ok(false) };
        let llms = Llms(vec!["databricks-llama-4-maverick"]);
        assert!(resolve_crew_model(Some("gpt-4"), false, &p, &llms).await.is_none());
    }

    #[tokio::test]
    async fn test_no_model() {
        let p = Platform { managed: Ok(true) };
        let llms = Llms(vec!["databricks-llama-4-maverick"]);
        assert!(resolve_crew_model(None, true, &p, &llms).await.is_some());
        assert!(resolve_crew_model(Some(" "), false, &p, &llms).await.is_none());
    }

    #[tokio::test]
    async fn test_credentials() {
        let empty = StaticApiKeyProvider::default();
        let configured = StaticApiKeyProvider::new(HashMap::from([(
            "openai".to_string(),
            "sk-real".to_string(),
        )]));

        assert!(resolve_credential(false, &configured, "sk-ph").await.is_none());

        let kept = resolve_credential(true, &configured, "sk-ph").await.unwrap();
        assert_eq!(kept.source, CredentialSource::Configured);
        assert_eq!(kept.value, "sk-real");

        let placeholder = resolve_credential(true, &empty, "sk-ph").await.unwrap();
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.value, "sk-ph");

        assert!(resolve_credential(true, &BrokenKeys, "sk-ph").await.is_none());
    }

    #[test]
    fn test_credential_debug_redacts() {
        let c = Credential {
            provider: "openai".into(),
            value: "sk-secret".into(),
            source: CredentialSource::Configured,
        };
        assert!(!format!("{c:?}").contains("sk-secret"));
    }
}
