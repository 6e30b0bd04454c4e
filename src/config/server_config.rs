//! HTTP server configuration parsing from environment variables.

use super::{Lookup, parse_var, var_or};
use anyhow::Result;

/// Server environment configuration
#[derive(Debug, Clone)]
pub struct ServerEnvConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub max_forecast_horizon: usize,
}

impl ServerEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let cors_allowed_origins = var_or(lookup, "CORS_ALLOWED_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: var_or(lookup, "HOST", "0.0.0.0"),
            port: parse_var(lookup, "PORT", "8000")?,
            cors_allowed_origins,
            max_upload_bytes: parse_var(lookup, "MAX_UPLOAD_BYTES", "10485760")?,
            max_forecast_horizon: parse_var(lookup, "MAX_FORECAST_HORIZON", "1000")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
