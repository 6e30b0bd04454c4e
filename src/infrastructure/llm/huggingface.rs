//! Client for a hosted text-generation inference endpoint.

use crate::domain::errors::LlmError;
use crate::domain::ports::TextGenerator;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, join_url};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const BACKEND: &str = "HuggingFace";

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

pub struct HuggingFaceClient {
    client: ClientWithMiddleware,
    endpoint: url::Url,
    api_token: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(
        inference_url: &str,
        model: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let endpoint = join_url(inference_url, model).map_err(|e| LlmError::Unavailable {
            backend: BACKEND.to_string(),
            reason: format!("invalid inference URL: {}", e),
        })?;

        info!("Text-generation fallback initialised for {}", endpoint);
        Ok(Self {
            client: HttpClientFactory::create_client(timeout),
            endpoint,
            api_token,
        })
    }

    fn transport(reason: impl ToString) -> LlmError {
        LlmError::Transport {
            backend: BACKEND.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Pull the generated text out of a pipeline-style response.
///
/// `[{"generated_text": "..."}]` yields the first text; any other shape is
/// returned verbatim as JSON.
pub fn extract_generated_text(body: &Value) -> String {
    match body.as_array().and_then(|items| items.first()) {
        Some(first) => first
            .get("generated_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => match body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = InferenceRequest { inputs: prompt };

        let mut request = self
            .client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&payload).map_err(Self::transport)?);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        debug!("Sending prompt to {}", self.endpoint);
        let response = request.send().await.map_err(Self::transport)?;
        if !response.status().is_success() {
            return Err(LlmError::Status {
                backend: BACKEND.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(Self::transport)?;
        Ok(extract_generated_text(&body))
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
