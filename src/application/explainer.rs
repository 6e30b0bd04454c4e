//! Per-timestep attributions for a single prepared window.
//!
//! Expected gradients: interpolate between the input and randomly chosen
//! background references, estimate the model gradient at each interpolated
//! point by central differences, and average `gradient * (input - reference)`.
//! The background is synthetic, drawn from a normal distribution matching the
//! input's mean and spread.

use crate::application::pipeline::batch_tensor;
use crate::config::ExplainerEnvConfig;
use crate::domain::errors::PipelineError;
use crate::domain::ports::ForecastModel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde_json::{Map, Value};
use statrs::statistics::Statistics;
use tracing::debug;

const STD_EPSILON: f64 = 1e-6;
const RELATIVE_STEP: f64 = 1e-3;

pub fn timestep_key(index: usize) -> String {
    format!("Timestep t{}", index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Mean model output over the background
    pub base_value: f64,
    /// Signed contribution of each timestep, oldest first
    pub values: Vec<f64>,
}

impl Attribution {
    pub fn contributions(&self) -> Map<String, Value> {
        self.keyed(|v| v)
    }

    pub fn importance(&self) -> Map<String, Value> {
        self.keyed(f64::abs)
    }

    fn keyed(&self, f: impl Fn(f64) -> f64) -> Map<String, Value> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (timestep_key(i), Value::from(f(v))))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GradientExplainer {
    background_samples: usize,
    samples: usize,
    seed: Option<u64>,
}

impl GradientExplainer {
    pub fn new(config: &ExplainerEnvConfig) -> Self {
        Self {
            background_samples: config.background_samples.max(1),
            samples: config.samples.max(1),
            seed: config.seed,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Synthetic references shaped like `input`, drawn from
    /// `N(mean(input), std(input) + 1e-6)`.
    pub fn background<R: Rng + ?Sized>(
        &self,
        input: &[f64],
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>, PipelineError> {
        let mean = input.iter().mean();
        let std_dev = input.iter().population_std_dev() + STD_EPSILON;
        if !mean.is_finite() || !std_dev.is_finite() {
            return Err(PipelineError::Explainer(
                "input contains non-finite values".to_string(),
            ));
        }

        let normal = Normal::new(mean, std_dev).map_err(|e| {
            PipelineError::Explainer(format!("invalid background distribution: {}", e))
        })?;

        let mut background = Vec::with_capacity(self.background_samples);
        for _ in 0..self.background_samples {
            let mut row = Vec::with_capacity(input.len());
            for _ in 0..input.len() {
                row.push(normal.sample(rng));
            }
            background.push(row);
        }
        Ok(background)
    }

    pub fn explain(
        &self,
        model: &dyn ForecastModel,
        input: &[f64],
    ) -> Result<Attribution, PipelineError> {
        if input.is_empty() {
            return Err(PipelineError::Explainer("input window is empty".to_string()));
        }

        let mut rng = self.rng();
        let background = self.background(input, &mut rng)?;
        let base_value = evaluate(model, &background)?.iter().mean();

        let step = input.iter().map(|x| x.abs()).fold(1.0, f64::max) * RELATIVE_STEP;
        let mut totals = vec![0.0; input.len()];
        for _ in 0..self.samples {
            let reference = &background[rng.random_range(0..background.len())];
            let alpha: f64 = rng.random();
            let point: Vec<f64> = input
                .iter()
                .zip(reference)
                .map(|(x, b)| b + alpha * (x - b))
                .collect();

            let gradient = central_gradient(model, &point, step)?;
            for (i, g) in gradient.iter().enumerate() {
                totals[i] += g * (input[i] - reference[i]);
            }
        }

        let n = self.samples as f64;
        let values: Vec<f64> = totals.into_iter().map(|t| t / n).collect();
        debug!(
            "Attributions for '{}': base {:.6}, {} timesteps, {} samples",
            model.name(),
            base_value,
            values.len(),
            self.samples
        );

        Ok(Attribution { base_value, values })
    }
}

/// Central-difference gradient, all `2 * len` perturbations in one batch.
fn central_gradient(
    model: &dyn ForecastModel,
    point: &[f64],
    step: f64,
) -> Result<Vec<f64>, PipelineError> {
    let mut rows = Vec::with_capacity(point.len() * 2);
    for i in 0..point.len() {
        let mut up = point.to_vec();
        up[i] += step;
        let mut down = point.to_vec();
        down[i] -= step;
        rows.push(up);
        rows.push(down);
    }

    let outputs = evaluate(model, &rows)?;
    Ok(outputs
        .chunks(2)
        .zip(rows.chunks(2))
        .enumerate()
        .map(|(i, (out, pair))| {
            // the model sees f32 inputs, so measure the step it actually got
            let delta = pair[0][i] as f32 as f64 - pair[1][i] as f32 as f64;
            if delta == 0.0 { 0.0 } else { (out[0] - out[1]) / delta }
        })
        .collect())
}

fn evaluate(model: &dyn ForecastModel, rows: &[Vec<f64>]) -> Result<Vec<f64>, PipelineError> {
    let tensor = batch_tensor(rows);
    let outputs = model
        .predict(tensor.view())
        .map_err(|e| PipelineError::Explainer(e.to_string()))?;

    if outputs.len() != rows.len() {
        return Err(PipelineError::Explainer(format!(
            "model returned {} outputs for a batch of {}",
            outputs.len(),
            rows.len()
        )));
    }
    Ok(outputs.into_iter().map(f64::from).collect())
}
