use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::explainer::GradientExplainer;
use crate::application::explanation::{ExplanationService, GeneratorFactory};
use crate::application::model_registry::ModelRegistry;
use crate::application::pipeline::InferencePipeline;
use crate::config::Config;
use crate::domain::ports::TextGenerator;
use crate::domain::repositories::FeedbackRepository;
use crate::infrastructure::llm::{HuggingFaceClient, OllamaClient};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::{InMemoryFeedbackRepository, Scaler};

/// Everything a request handler needs, shared read-only across requests.
#[derive(Clone)]
pub struct ServicesHandle {
    pub pipeline: Arc<InferencePipeline>,
    pub explainer: Arc<GradientExplainer>,
    pub explanations: Arc<ExplanationService>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub metrics: Arc<Metrics>,
    pub max_forecast_horizon: usize,
}

impl ServicesHandle {
    /// Assemble a handle around pre-built services with fresh metrics and an
    /// empty feedback store.
    pub fn from_parts(
        pipeline: InferencePipeline,
        explainer: GradientExplainer,
        explanations: ExplanationService,
        max_forecast_horizon: usize,
    ) -> Result<Self> {
        let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);
        metrics
            .models_loaded
            .set(pipeline.registry().loaded_names().len() as f64);

        Ok(Self {
            pipeline: Arc::new(pipeline),
            explainer: Arc::new(explainer),
            explanations: Arc::new(explanations.with_metrics(metrics.clone())),
            feedback: Arc::new(InMemoryFeedbackRepository::new()),
            metrics,
            max_forecast_horizon,
        })
    }
}

pub struct ServicesBootstrap;

impl ServicesBootstrap {
    pub async fn init(config: &Config) -> Result<ServicesHandle> {
        // 1. Models and scaler
        let manifest = config
            .models
            .manifest()
            .context("Failed to read model manifest")?;
        let models_config = config.models.clone();
        let registry = tokio::task::spawn_blocking(move || {
            ModelRegistry::load(&models_config, &manifest)
        })
        .await
        .context("Model loading task failed")?;

        for (name, reason) in registry.unavailable() {
            warn!("Model '{}' unavailable: {}", name, reason);
        }

        let scaler = Scaler::load_optional(&config.models.scaler_path);
        let pipeline = InferencePipeline::new(Arc::new(registry), scaler);

        // 2. Explanation backends
        let explanations = Self::explanation_service(config).await;

        ServicesHandle::from_parts(
            pipeline,
            GradientExplainer::new(&config.explainer),
            explanations,
            config.server.max_forecast_horizon,
        )
    }

    /// Probe the local generation service once; the hosted fallback is only
    /// built if a request needs it.
    async fn explanation_service(config: &Config) -> ExplanationService {
        let llm = &config.llm;
        let request_timeout = Duration::from_secs(llm.request_timeout_secs);

        let ollama = OllamaClient::new(&llm.ollama_base_url, &llm.ollama_model, request_timeout);
        let primary: Option<Arc<dyn TextGenerator>> = if ollama
            .probe(Duration::from_millis(llm.probe_timeout_ms))
            .await
        {
            info!("Using Ollama model '{}' for explanations", llm.ollama_model);
            Some(Arc::new(ollama))
        } else {
            info!("Ollama unavailable, explanations will use the fallback generator");
            None
        };

        let inference_url = llm.hf_inference_url.clone();
        let model = llm.hf_model.clone();
        let token = llm.hf_api_token.clone();
        let fallback: GeneratorFactory = Box::new(move || {
            let client = HuggingFaceClient::new(&inference_url, &model, token.clone(), request_timeout)?;
            Ok(Arc::new(client) as Arc<dyn TextGenerator>)
        });

        ExplanationService::new(primary, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplainerEnvConfig;
    use crate::infrastructure::mock::{MockTextGenerator, StepModel};

    #[test]
    fn test_handle_from_parts_counts_loaded_models() {
        let registry = ModelRegistry::new()
            .with_model("lstm", Arc::new(StepModel::new("lstm", Some(3), 1.0)))
            .with_unavailable("cnn_lstm", "missing");
        let explanations = ExplanationService::new(
            None,
            Box::new(|| {
                Ok(Arc::new(MockTextGenerator::answering("fallback", "ok")) as Arc<dyn TextGenerator>)
            }),
        );

        let handle = ServicesHandle::from_parts(
            InferencePipeline::new(Arc::new(registry), None),
            GradientExplainer::new(&ExplainerEnvConfig::default()),
            explanations,
            1000,
        )
        .unwrap();

        assert_eq!(handle.metrics.models_loaded.get(), 1.0);
        assert_eq!(handle.max_forecast_horizon, 1000);
        assert!(handle.metrics.render().contains("forecastd_models_loaded 1"));
    }

    #[tokio::test]
    async fn test_init_without_artifacts_still_starts() {
        let config = Config::from_lookup(&|key: &str| match key {
            "MODEL_DIR" => Some("/nonexistent/forecastd-models".to_string()),
            "OLLAMA_BASE_URL" => Some("http://127.0.0.1:9".to_string()),
            "OLLAMA_PROBE_TIMEOUT_MS" => Some("200".to_string()),
            _ => None,
        })
        .unwrap();

        let handle = ServicesBootstrap::init(&config).await.unwrap();

        assert!(handle.pipeline.registry().loaded_names().is_empty());
        assert!(handle.pipeline.scaler().is_none());
        assert!(!handle.explanations.has_primary());
        assert!(!handle.explanations.fallback_initialized());
    }
}
