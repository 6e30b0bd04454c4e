//! Configuration module for forecastd.
//!
//! Structured configuration loaded from environment variables (optionally
//! seeded from a `.env` file), organized by concern: Server, Models, LLM and
//! Explainer.

mod explainer_config;
mod llm_config;
mod model_config;
mod server_config;

pub use explainer_config::ExplainerEnvConfig;
pub use llm_config::LlmEnvConfig;
pub use model_config::{ModelEnvConfig, ModelManifest, ModelSpec};
pub use server_config::ServerEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Variable lookup used by the sub-configs; `from_env` passes `std::env::var`.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerEnvConfig,
    pub models: ModelEnvConfig,
    pub llm: LlmEnvConfig,
    pub explainer: ExplainerEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            server: ServerEnvConfig::from_lookup(lookup).context("Failed to load server config")?,
            models: ModelEnvConfig::from_lookup(lookup),
            llm: LlmEnvConfig::from_lookup(lookup).context("Failed to load LLM config")?,
            explainer: ExplainerEnvConfig::from_lookup(lookup)
                .context("Failed to load explainer config")?,
        })
    }
}

fn var_or(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(lookup: Lookup<'_>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(lookup, key, default)
        .parse::<T>()
        .with_context(|| format!("Failed to parse {}", key))
}
