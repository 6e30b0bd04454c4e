//! Gradient explainer configuration parsing from environment variables.

use super::{Lookup, parse_var};
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ExplainerEnvConfig {
    /// Size of the synthetic background distribution
    pub background_samples: usize,
    /// Interpolation samples drawn per explanation
    pub samples: usize,
    /// Fixed RNG seed for reproducible attributions
    pub seed: Option<u64>,
}

impl Default for ExplainerEnvConfig {
    fn default() -> Self {
        Self {
            background_samples: 50,
            samples: 200,
            seed: None,
        }
    }
}

impl ExplainerEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let seed = match lookup("SHAP_SEED").filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .context("Failed to parse SHAP_SEED")?,
            ),
            None => None,
        };

        let config = Self {
            background_samples: parse_var(lookup, "SHAP_BACKGROUND_SAMPLES", "50")?,
            samples: parse_var(lookup, "SHAP_SAMPLES", "200")?,
            seed,
        };

        if config.background_samples == 0 || config.samples == 0 {
            anyhow::bail!("SHAP_BACKGROUND_SAMPLES and SHAP_SAMPLES must be positive");
        }
        Ok(config)
    }
}
