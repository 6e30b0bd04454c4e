//! LLM backend configuration parsing from environment variables.

use super::{Lookup, parse_var, var_or};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct LlmEnvConfig {
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub probe_timeout_ms: u64,
    pub hf_inference_url: String,
    pub hf_model: String,
    pub hf_api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl LlmEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            ollama_base_url: var_or(lookup, "OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: var_or(lookup, "OLLAMA_MODEL", "llama2-uncensored"),
            probe_timeout_ms: parse_var(lookup, "OLLAMA_PROBE_TIMEOUT_MS", "1000")?,
            hf_inference_url: var_or(
                lookup,
                "HF_INFERENCE_URL",
                "https://api-inference.huggingface.co/models",
            ),
            hf_model: var_or(lookup, "HF_MODEL", "google/flan-t5-base"),
            hf_api_token: lookup("HF_API_TOKEN").filter(|t| !t.trim().is_empty()),
            request_timeout_secs: parse_var(lookup, "LLM_REQUEST_TIMEOUT_SECS", "120")?,
        })
    }
}
