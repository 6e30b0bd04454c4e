//! In-process stand-ins for model and LLM backends.

use crate::domain::errors::{LlmError, ModelError};
use crate::domain::ports::{ForecastModel, TextGenerator};
use async_trait::async_trait;
use ndarray::{ArrayView3, Axis};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// `bias + Σ weights[i] * x[i]`, window = number of weights
pub struct LinearModel {
    name: String,
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModel {
    pub fn new(name: impl Into<String>, weights: Vec<f64>, bias: f64) -> Self {
        Self {
            name: name.into(),
            weights,
            bias,
        }
    }
}

impl ForecastModel for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_window(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn predict(&self, input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError> {
        if input.len_of(Axis(1)) != self.weights.len() {
            return Err(ModelError::Shape {
                reason: format!(
                    "expected {} timesteps, got {}",
                    self.weights.len(),
                    input.len_of(Axis(1))
                ),
            });
        }
        Ok(input
            .outer_iter()
            .map(|row| {
                let dot: f64 = row
                    .iter()
                    .zip(&self.weights)
                    .map(|(&x, w)| x as f64 * w)
                    .sum();
                (dot + self.bias) as f32
            })
            .collect())
    }
}

/// Predicts `last observation + step` and records every input row it sees
pub struct StepModel {
    name: String,
    window: Option<usize>,
    step: f32,
    seen: Mutex<Vec<Vec<f32>>>,
}

impl StepModel {
    pub fn new(name: impl Into<String>, window: Option<usize>, step: f32) -> Self {
        Self {
            name: name.into(),
            window,
            step,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_inputs(&self) -> Vec<Vec<f32>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ForecastModel for StepModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_window(&self) -> Option<usize> {
        self.window
    }

    fn predict(&self, input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError> {
        let mut out = Vec::new();
        for row in input.outer_iter() {
            let values: Vec<f32> = row.iter().copied().collect();
            let last = values.last().copied().unwrap_or(0.0);
            out.push(last + self.step);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(values);
            }
        }
        Ok(out)
    }
}

/// Always fails inference
pub struct FailingModel {
    name: String,
    window: Option<usize>,
}

impl FailingModel {
    pub fn new(name: impl Into<String>, window: Option<usize>) -> Self {
        Self {
            name: name.into(),
            window,
        }
    }
}

impl ForecastModel for FailingModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_window(&self) -> Option<usize> {
        self.window
    }

    fn predict(&self, _input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::Inference {
            reason: "mock backend failure".to_string(),
        })
    }
}

/// Text generator returning a fixed answer (or error) and counting calls
pub struct MockTextGenerator {
    name: String,
    answer: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn answering(name: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answer: Some(answer.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answer: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answer.clone().ok_or_else(|| LlmError::Status {
            backend: self.name.clone(),
            status: 503,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
