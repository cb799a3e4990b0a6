//! Model resolution for crewdeck.
//!
//! Turns model identifiers into engine-ready handles, looks up provider
//! credentials, and detects the managed hosting platform.
//!
//! # Main types
//!
//! - [`LlmManager`] / [`ModelCatalog`]: model identifier to [`LlmHandle`].
//! - [`ApiKeyProvider`]: provider credential lookup (env, static, fallback).
//! - [`PlatformDetector`] / [`EnvPlatformDetector`]: managed-platform check.

/// Provider and model definitions.
pub mod config;
/// Environment access that tests can replace.
pub mod env;
/// Provider credential lookup.
pub mod keys;
/// Model resolution.
pub mod manager;
/// Managed platform detection.
pub mod platform;

pub use config::{LlmProvider, ModelConfig};
pub use keys::{ApiKeyProvider, EnvApiKeyProvider, FallbackApiKeyProvider, StaticApiKeyProvider};
pub use manager::{LlmHandle, LlmManager, ModelCatalog};
pub use platform::{EnvPlatformDetector, PlatformDetector, PlatformSettings};
