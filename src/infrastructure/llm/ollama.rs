//! Client for an Ollama-compatible local generation API.

use crate::domain::errors::LlmError;
use crate::domain::ports::TextGenerator;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, join_url};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const BACKEND: &str = "Ollama";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaClient {
    client: ClientWithMiddleware,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// One-shot liveness check against the base URL
    pub async fn probe(&self, timeout: Duration) -> bool {
        let client = HttpClientFactory::create_probe_client(timeout);
        match client.get(&self.base_url).send().await {
            Ok(resp) => {
                info!(
                    "Ollama reachable at {} (status {})",
                    self.base_url,
                    resp.status()
                );
                true
            }
            Err(e) => {
                warn!("Ollama not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }

    fn transport(reason: impl ToString) -> LlmError {
        LlmError::Transport {
            backend: BACKEND.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn answer_from(body: GenerateResponse) -> Result<String, LlmError> {
    if body.response.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            backend: BACKEND.to_string(),
        });
    }
    Ok(body.response)
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = join_url(&self.base_url, "api/generate").map_err(Self::transport)?;
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!("Sending prompt to Ollama model {}", self.model);
        let response = self
            .client
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&payload).map_err(Self::transport)?)
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(LlmError::Status {
                backend: BACKEND.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: GenerateResponse = response.json().await.map_err(Self::transport)?;
        answer_from(body)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", address)
    }

    fn client(base_url: &str) -> OllamaClient {
        OllamaClient::new(base_url, "llama3", Duration::from_secs(5))
    }

    #[test]
    fn test_blank_response_is_empty() {
        let body: GenerateResponse = serde_json::from_value(json!({"response": "  \n"})).unwrap();
        assert!(matches!(answer_from(body), Err(LlmError::EmptyResponse { .. })));

        let body: GenerateResponse = serde_json::from_value(json!({"done": true})).unwrap();
        assert!(matches!(answer_from(body), Err(LlmError::EmptyResponse { .. })));

        let body: GenerateResponse =
            serde_json::from_value(json!({"response": "Timestep t2 dominates."})).unwrap();
        assert_eq!(answer_from(body).unwrap(), "Timestep t2 dominates.");
    }

    #[tokio::test]
    async fn test_probe_unreachable_port() {
        let ollama = client("http://127.0.0.1:9");
        assert!(!ollama.probe(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_probe_and_generate_against_local_server() {
        let app = Router::new()
            .route("/", get(|| async { "Ollama is running" }))
            .route(
                "/api/generate",
                post(|| async { axum::Json(json!({"response": "It rose.", "done": true})) }),
            );
        let base_url = serve(app).await;
        let ollama = client(&base_url);

        assert!(ollama.probe(Duration::from_secs(2)).await);
        assert_eq!(ollama.generate("why?").await.unwrap(), "It rose.");
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::NOT_FOUND, "model not found") }),
        );
        let base_url = serve(app).await;

        let err = client(&base_url).generate("why?").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::Status { status: 404, .. }
        ));
    }
}
