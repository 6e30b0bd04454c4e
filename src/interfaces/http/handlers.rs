//! HTTP request handlers

use crate::application::bootstrap::ServicesHandle;
use crate::application::parser::{parse_input, parse_nested};
use crate::application::pipeline::PipelineWarning;
use crate::domain::errors::PipelineError;
use crate::domain::feedback::FeedbackRecord;
use crate::domain::transform::ADVERTISED_TRANSFORMS;
use crate::infrastructure::observability::Metrics;
use crate::interfaces::http::error::ApiError;
use crate::interfaces::http::extract::InferenceForm;
use axum::Json;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info};

/// Feedback metric label for model names that are not loaded.
pub const UNKNOWN_MODEL_LABEL: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub forecast: Vec<f64>,
    pub baseline: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Deserialize)]
pub struct ShapRequest {
    pub model: String,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct ShapResponse {
    pub base_value: f64,
    pub shap_values: Map<String, Value>,
    pub feature_importance: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub question: String,
    pub shap_values: Value,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub transforms: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub memory_usage_mb: f64,
    pub loaded_models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub model: String,
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub feedback_id: usize,
}

/// Run CPU-bound inference off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn record_warnings(metrics: &Metrics, warnings: &[PipelineWarning]) {
    for warning in warnings {
        metrics.inc_pipeline_warning(warning.kind());
    }
}

/// Model name, required and loaded
fn require_model(state: &ServicesHandle, form: &InferenceForm) -> Result<String, ApiError> {
    let name = form.model.clone().ok_or(PipelineError::MissingModel)?;
    state.pipeline.model(&name)?;
    Ok(name)
}

pub async fn predict(
    State(state): State<ServicesHandle>,
    form: InferenceForm,
) -> Result<Json<PredictResponse>, ApiError> {
    let model = require_model(&state, &form)?;
    let series = parse_input(form.source.as_ref())?;
    debug!("Predict with '{}' on {} observations", model, series.len());

    let pipeline = state.pipeline.clone();
    let transform = form.transform.clone();
    let name = model.clone();
    let started = Instant::now();
    let prediction =
        run_blocking(move || pipeline.predict(&name, transform.as_deref(), &series)).await?;
    state
        .metrics
        .observe_inference(&model, "predict", started.elapsed().as_secs_f64());
    record_warnings(&state.metrics, &prediction.warnings);

    Ok(Json(PredictResponse {
        prediction: prediction.value,
        warnings: prediction.warnings,
    }))
}

pub async fn forecast(
    State(state): State<ServicesHandle>,
    form: InferenceForm,
) -> Result<Json<ForecastResponse>, ApiError> {
    let horizon = form.horizon(state.max_forecast_horizon)?;
    let model = require_model(&state, &form)?;
    let series = parse_input(form.source.as_ref())?;
    debug!(
        "Forecast {} steps with '{}' on {} observations",
        horizon,
        model,
        series.len()
    );

    let pipeline = state.pipeline.clone();
    let transform = form.transform.clone();
    let name = model.clone();
    let started = Instant::now();
    let forecast = run_blocking(move || {
        pipeline.forecast(&name, transform.as_deref(), &series, horizon)
    })
    .await?;
    state
        .metrics
        .observe_inference(&model, "forecast", started.elapsed().as_secs_f64());
    record_warnings(&state.metrics, &forecast.warnings);

    Ok(Json(ForecastResponse {
        forecast: forecast.forecast,
        baseline: forecast.baseline,
        warnings: forecast.warnings,
    }))
}

pub async fn shap_summary(
    State(state): State<ServicesHandle>,
    Json(request): Json<ShapRequest>,
) -> Result<Json<ShapResponse>, ApiError> {
    state.pipeline.registry().get(&request.model)?;
    let series = parse_nested(&request.data)?;

    let pipeline = state.pipeline.clone();
    let explainer = state.explainer.clone();
    let name = request.model.clone();
    let transform = request.transform.clone();
    let started = Instant::now();
    let (attribution, warnings) = run_blocking(move || {
        let prepared = pipeline.prepare(&name, transform.as_deref(), &series)?;
        let attribution = explainer.explain(prepared.model.as_ref(), &prepared.window)?;
        Ok((attribution, prepared.warnings))
    })
    .await?;
    state
        .metrics
        .observe_inference(&request.model, "shap", started.elapsed().as_secs_f64());
    record_warnings(&state.metrics, &warnings);

    Ok(Json(ShapResponse {
        base_value: attribution.base_value,
        shap_values: attribution.contributions(),
        feature_importance: attribution.importance(),
        warnings,
    }))
}

pub async fn explain(
    State(state): State<ServicesHandle>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let explanation = state
        .explanations
        .explain(&request.question, &request.shap_values)
        .await?;
    debug!("Explanation generated by {}", explanation.backend);

    Ok(Json(ExplainResponse {
        answer: explanation.answer,
    }))
}

pub async fn models(State(state): State<ServicesHandle>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.pipeline.registry().loaded_names(),
        transforms: ADVERTISED_TRANSFORMS.to_vec(),
    })
}

pub async fn health(State(state): State<ServicesHandle>) -> Json<HealthResponse> {
    Json(HealthResponse {
        memory_usage_mb: resident_memory_mb(),
        loaded_models: state.pipeline.registry().loaded_names(),
    })
}

pub async fn feedback(
    State(state): State<ServicesHandle>,
    Json(request): Json<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    // Only loaded model names become label values; anything else shares one series.
    let label = if state.pipeline.registry().contains_loaded(&request.model) {
        request.model.as_str()
    } else {
        UNKNOWN_MODEL_LABEL
    };
    state.metrics.inc_feedback(label);
    let record = FeedbackRecord::new(request.model, request.feedback);
    let feedback_id = state.feedback.append(record).await;
    info!("Feedback #{} recorded", feedback_id);

    Json(FeedbackResponse {
        status: "success",
        message: "Feedback recorded",
        feedback_id,
    })
}

pub async fn metrics(State(state): State<ServicesHandle>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Resident set size of this process, in MiB rounded to 2 decimals
fn resident_memory_mb() -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let bytes = system.process(pid).map(|p| p.memory()).unwrap_or(0);
    round2(bytes as f64 / (1024.0 * 1024.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
