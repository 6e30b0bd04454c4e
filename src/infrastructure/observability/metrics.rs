//! Prometheus metrics definitions for forecastd
//!
//! All metrics use the `forecastd_` prefix.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the prediction service
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// HTTP requests by endpoint and status code
    pub requests_total: CounterVec,
    /// Model inference latency by model and operation (predict, forecast, shap)
    pub inference_latency_seconds: HistogramVec,
    /// Non-fatal pipeline fallbacks (unknown transform, skipped scaling)
    pub pipeline_warnings_total: CounterVec,
    /// LLM calls by backend and outcome
    pub llm_requests_total: CounterVec,
    /// Number of models loaded at startup
    pub models_loaded: GenericGauge<AtomicF64>,
    /// Feedback submissions received
    pub feedback_total: CounterVec,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("forecastd_requests_total", "HTTP requests by endpoint and status"),
            &["endpoint", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let inference_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "forecastd_inference_latency_seconds",
                "Model inference latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["model", "operation"],
        )?;
        registry.register(Box::new(inference_latency_seconds.clone()))?;

        let pipeline_warnings_total = CounterVec::new(
            Opts::new(
                "forecastd_pipeline_warnings_total",
                "Non-fatal pipeline fallbacks by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(pipeline_warnings_total.clone()))?;

        let llm_requests_total = CounterVec::new(
            Opts::new("forecastd_llm_requests_total", "LLM calls by backend and outcome"),
            &["backend", "outcome"],
        )?;
        registry.register(Box::new(llm_requests_total.clone()))?;

        let models_loaded = Gauge::with_opts(Opts::new(
            "forecastd_models_loaded",
            "Number of models loaded at startup",
        ))?;
        registry.register(Box::new(models_loaded.clone()))?;

        let feedback_total = CounterVec::new(
            Opts::new("forecastd_feedback_total", "Feedback submissions by model"),
            &["model"],
        )?;
        registry.register(Box::new(feedback_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            inference_latency_seconds,
            pipeline_warnings_total,
            llm_requests_total,
            models_loaded,
            feedback_total,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_requests(&self, endpoint: &str, status: u16) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
    }

    pub fn observe_inference(&self, model: &str, operation: &str, seconds: f64) {
        self.inference_latency_seconds
            .with_label_values(&[model, operation])
            .observe(seconds);
    }

    pub fn inc_pipeline_warning(&self, kind: &str) {
        self.pipeline_warnings_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_llm(&self, backend: &str, outcome: &str) {
        self.llm_requests_total
            .with_label_values(&[backend, outcome])
            .inc();
    }

    pub fn inc_feedback(&self, model: &str) {
        self.feedback_total.with_label_values(&[model]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.models_loaded.set(3.0);
        let output = metrics.render();
        assert!(output.contains("forecastd_models_loaded 3"));
    }

    #[test]
    fn test_request_counter_labels() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_requests("/predict", 200);
        metrics.inc_requests("/predict", 404);
        let output = metrics.render();
        assert!(output.contains("forecastd_requests_total"));
        assert!(output.contains("status=\"404\""));
    }

    #[test]
    fn test_inference_histogram() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.observe_inference("lstm", "forecast", 0.02);
        let output = metrics.render();
        assert!(output.contains("forecastd_inference_latency_seconds_bucket"));
        assert!(output.contains("model=\"lstm\""));
    }

    #[test]
    fn test_warning_and_llm_counters() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_pipeline_warning("unknown_transform");
        metrics.inc_llm("Ollama", "error");
        let output = metrics.render();
        assert!(output.contains("unknown_transform"));
        assert!(output.contains("forecastd_llm_requests_total"));
    }
}
