use crate::env::{process_env, EnvLookup};
use crewdeck_core::{CrewError, CrewResult};
use serde::Deserialize;
use std::env::VarError;

/// Detects whether the process runs inside the managed hosting platform.
///
/// The managed platform ships its own default model and credential
/// conventions; detection may fail, which callers treat as "not managed".
pub trait PlatformDetector: Send + Sync {
    /// Whether this process runs on the managed platform.
    fn is_managed_environment(&self) -> CrewResult<bool>;

    /// Model used when the configured model is unusable or absent.
    fn default_model(&self) -> &str;
}

/// `[platform]` section of `crewdeck.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSettings {
    /// Any of these variables being set (non-empty) marks the managed platform.
    #[serde(default = "default_marker_vars")]
    pub marker_vars: Vec<String>,
    /// Model the platform falls back to.
    #[serde(default = "default_platform_model")]
    pub default_model: String,
    /// Credential forwarded to the engine when the platform has no OpenAI key.
    #[serde(default = "default_placeholder_credential")]
    pub placeholder_credential: String,
}

fn default_marker_vars() -> Vec<String> {
    vec![
        "DATABRICKS_APP_NAME".to_string(),
        "DATABRICKS_APP_PORT".to_string(),
    ]
}

fn default_platform_model() -> String {
    "databricks-llama-4-maverick".to_string()
}

fn default_placeholder_credential() -> String {
    "sk-placeholder-managed-platform".to_string()
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            marker_vars: default_marker_vars(),
            default_model: default_platform_model(),
            placeholder_credential: default_placeholder_credential(),
        }
    }
}

/// Detector driven by marker environment variables.
pub struct EnvPlatformDetector {
    marker_vars: Vec<String>,
    default_model: String,
    lookup: EnvLookup,
}

impl EnvPlatformDetector {
    /// Create a detector reading the process environment.
    pub fn new(settings: &PlatformSettings) -> Self {
        Self::with_lookup(settings, process_env())
    }

    /// Create a detector with a custom environment lookup.
    pub fn with_lookup(settings: &PlatformSettings, lookup: EnvLookup) -> Self {
        Self {
            marker_vars: settings.marker_vars.clone(),
            default_model: settings.default_model.clone(),
            lookup,
        }
    }
}

impl PlatformDetector for EnvPlatformDetector {
    fn is_managed_environment(&self) -> CrewResult<bool> {
        for var in &self.marker_vars {
            match (self.lookup)(var) {
                Ok(value) if !value.trim().is_empty() => return Ok(true),
                Ok(_) | Err(VarError::NotPresent) => continue,
                Err(VarError::NotUnicode(_)) => {
                    return Err(CrewError::Platform(format!(
                        "marker variable {var} is not valid unicode"
                    )))
                }
            }
        }
        Ok(false)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::env::fixed_env;
    use std::ffi::OsString;
    use std::sync::Arc;

    #[test]
    fn test_not_managed_without_markers() {
        let detector = EnvPlatformDetector::with_lookup(
            &PlatformSettings::default(),
            fixed_env(Vec::<(&str, &str)>::new()),
        );
        assert!(!detector.is_managed_environment().unwrap());
        assert_eq!(detector.default_model(), "databricks-llama-4-maverick");
    }

    #[test]
    fn test_managed_when_any_marker_set() {
        let detector = EnvPlatformDetector::with_lookup(
            &PlatformSettings::default(),
            fixed_env([("DATABRICKS_APP_PORT", "8000")]),
        );
        assert!(detector.is_managed_environment().unwrap());
    }

    #[test]
    fn test_blank_marker_is_ignored() {
        let detector = EnvPlatformDetector::with_lookup(
            &PlatformSettings::default(),
            fixed_env([("DATABRICKS_APP_NAME", "")]),
        );
        assert!(!detector.is_managed_environment().unwrap());
    }

    #[test]
    fn test_non_unicode_marker_is_an_error() {
        let lookup: EnvLookup =
            Arc::new(|_: &str| Err(VarError::NotUnicode(OsString::from("x"))));
        let detector = EnvPlatformDetector::with_lookup(&PlatformSettings::default(), lookup);
        assert!(detector.is_managed_environment().is_err());
    }
}
