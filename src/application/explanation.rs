//! Natural-language explanations of attribution summaries.
//!
//! The primary generator (a local generation service found reachable at
//! startup) is tried first. Any failure, including an empty answer, moves the
//! request to the fallback generator, which is built on first use and then
//! shared for the life of the process.

use crate::domain::errors::LlmError;
use crate::domain::ports::TextGenerator;
use crate::infrastructure::observability::Metrics;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub type GeneratorFactory =
    Box<dyn Fn() -> Result<Arc<dyn TextGenerator>, LlmError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub answer: String,
    /// Name of the generator that produced the answer
    pub backend: String,
}

pub struct ExplanationService {
    primary: Option<Arc<dyn TextGenerator>>,
    fallback: OnceCell<Arc<dyn TextGenerator>>,
    fallback_factory: GeneratorFactory,
    metrics: Option<Arc<Metrics>>,
}

impl ExplanationService {
    pub fn new(primary: Option<Arc<dyn TextGenerator>>, fallback_factory: GeneratorFactory) -> Self {
        Self {
            primary,
            fallback: OnceCell::new(),
            fallback_factory,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn fallback_initialized(&self) -> bool {
        self.fallback.initialized()
    }

    pub async fn explain(&self, question: &str, shap_values: &Value) -> Result<Explanation, LlmError> {
        let prompt = build_prompt(question, shap_values);

        if let Some(primary) = &self.primary {
            match primary.generate(&prompt).await {
                Ok(answer) if !answer.trim().is_empty() => {
                    self.record(primary.name(), "success");
                    return Ok(Explanation {
                        answer,
                        backend: primary.name().to_string(),
                    });
                }
                Ok(_) => {
                    self.record(primary.name(), "empty");
                    warn!("{} returned an empty answer, using fallback", primary.name());
                }
                Err(e) => {
                    self.record(primary.name(), "error");
                    warn!("{} failed ({}), using fallback", primary.name(), e);
                }
            }
        }

        let fallback = self
            .fallback
            .get_or_try_init(|| async {
                info!("Initialising fallback text generator");
                (self.fallback_factory)()
            })
            .await?;

        match fallback.generate(&prompt).await {
            Ok(answer) => {
                self.record(fallback.name(), "success");
                Ok(Explanation {
                    answer,
                    backend: fallback.name().to_string(),
                })
            }
            Err(e) => {
                self.record(fallback.name(), "error");
                Err(e)
            }
        }
    }

    fn record(&self, backend: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_llm(backend, outcome);
        }
    }
}

/// `Given the following SHAP feature contributions: k: v, ...\nQuestion: q\nAnswer:`
///
/// A non-object summary is embedded as-is.
pub fn build_prompt(question: &str, shap_values: &Value) -> String {
    let summary = match shap_values {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, plain(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => plain(other),
    };

    format!(
        "Given the following SHAP feature contributions: {}\nQuestion: {}\nAnswer:",
        summary, question
    )
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
