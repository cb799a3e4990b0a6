//! Read-only access to environment variables.
//!
//! Detectors and key providers read the environment through an injectable
//! lookup so they can be exercised without touching the process table.

use std::collections::HashMap;
use std::env::VarError;
use std::sync::Arc;

/// A function resolving an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Result<String, VarError> + Send + Sync>;

/// Lookup backed by the real process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name))
}

/// Lookup backed by a fixed set of variables.
pub fn fixed_env<I, K, V>(vars: I) -> EnvLookup
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    Arc::new(move |name: &str| vars.get(name).cloned().ok_or(VarError::NotPresent))
}
