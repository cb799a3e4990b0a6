use crewdeck_core::CrewError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model provider a model identifier is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI and compatible endpoints.
    OpenAi,
    /// Anthropic Claude models.
    Anthropic,
    /// Models served by the managed platform's serving endpoints.
    Databricks,
    /// Google Gemini models.
    Gemini,
    /// DeepSeek models.
    DeepSeek,
    /// Local inference; no credential needed.
    Ollama,
}

impl LlmProvider {
    /// Name used when asking an `ApiKeyProvider` for this provider's key.
    pub fn key_name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Databricks => "databricks",
            LlmProvider::Gemini => "gemini",
            LlmProvider::DeepSeek => "deepseek",
            LlmProvider::Ollama => "ollama",
        }
    }

    /// Whether a model handle for this provider cannot be built without a key.
    ///
    /// Managed-platform models authenticate through the platform itself.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Databricks | LlmProvider::Ollama)
    }

    /// Infer the provider from a bare or provider-qualified model identifier.
    ///
    /// `"openai/gpt-4o"` resolves through the explicit prefix; bare ids are
    /// matched on well-known family prefixes.
    pub fn infer(model_id: &str) -> Option<LlmProvider> {
        if let Some((prefix, _)) = model_id.split_once('/') {
            if let Ok(provider) = prefix.parse() {
                return Some(provider);
            }
        }

        let lower = model_id.to_ascii_lowercase();
        if lower.starts_with("databricks-") {
            Some(LlmProvider::Databricks)
        } else if lower.starts_with("gpt-")
            || lower.starts_with("o1")
            || lower.starts_with("o3")
            || lower.starts_with("o4")
            || lower.starts_with("text-embedding")
        {
            Some(LlmProvider::OpenAi)
        } else if lower.starts_with("claude") {
            Some(LlmProvider::Anthropic)
        } else if lower.starts_with("gemini") {
            Some(LlmProvider::Gemini)
        } else if lower.starts_with("deepseek") {
            Some(LlmProvider::DeepSeek)
        } else {
            None
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_name())
    }
}

impl FromStr for LlmProvider {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            "databricks" => Ok(LlmProvider::Databricks),
            "gemini" => Ok(LlmProvider::Gemini),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            "ollama" => Ok(LlmProvider::Ollama),
            other => Err(CrewError::Llm(format!("unknown provider '{other}'"))),
        }
    }
}

/// Static description of a model, as registered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider serving the model.
    pub provider: LlmProvider,
    /// Identifier the provider knows the model by (no provider prefix).
    pub model_id: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Build a config with default sampling settings.
    pub fn new(provider: LlmProvider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Configured endpoint, or the provider's default.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com/v1",
                LlmProvider::Anthropic => "https://api.anthropic.com",
                LlmProvider::Databricks => "local://serving-endpoints",
                LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
                LlmProvider::DeepSeek => "https://api.deepseek.com",
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }

    /// Provider-qualified identifier, e.g. `openai/gpt-4o`.
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.provider, self.model_id)
    }
}
