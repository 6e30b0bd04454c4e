//! Windowing, scaling, transform and inference shared by the predict,
//! forecast and explanation paths.
//!
//! Preparation order for a request:
//! 1. resolve the model,
//! 2. keep the trailing window the model asks for,
//! 3. scale (non-fatal on failure),
//! 4. apply the optional transform,
//! 5. reshape to `(1, timesteps, 1)` and run the model.

use crate::application::model_registry::ModelRegistry;
use crate::domain::errors::{ModelError, PipelineError};
use crate::domain::ports::ForecastModel;
use crate::domain::series::TimeSeries;
use crate::domain::transform::Transform;
use crate::infrastructure::Scaler;
use ndarray::Array3;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_HORIZON: usize = 10;

/// Non-fatal fallbacks taken while serving a request
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    UnknownTransform { tag: String },
    ScalingSkipped { reason: String },
    InverseScalingSkipped { reason: String },
}

impl PipelineWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineWarning::UnknownTransform { .. } => "unknown_transform",
            PipelineWarning::ScalingSkipped { .. } => "scaling_skipped",
            PipelineWarning::InverseScalingSkipped { .. } => "inverse_scaling_skipped",
        }
    }
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::UnknownTransform { tag } => {
                write!(f, "Unknown transform '{}', no transform applied", tag)
            }
            PipelineWarning::ScalingSkipped { reason } => {
                write!(f, "Scaling skipped: {}", reason)
            }
            PipelineWarning::InverseScalingSkipped { reason } => {
                write!(f, "Inverse scaling skipped: {}", reason)
            }
        }
    }
}

impl Serialize for PipelineWarning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Model input ready for inference: windowed, scaled and transformed
pub struct PreparedInput {
    pub model: Arc<dyn ForecastModel>,
    pub window: Vec<f64>,
    pub transform: Transform,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value: f64,
    pub warnings: Vec<PipelineWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Predicted values, inverse scaled when a scaler is loaded
    pub forecast: Vec<f64>,
    /// Trailing values of the final window, in the scaled domain
    pub baseline: Vec<f64>,
    pub warnings: Vec<PipelineWarning>,
}

pub struct InferencePipeline {
    registry: Arc<ModelRegistry>,
    scaler: Option<Scaler>,
}

impl InferencePipeline {
    pub fn new(registry: Arc<ModelRegistry>, scaler: Option<Scaler>) -> Self {
        Self { registry, scaler }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    pub fn model(&self, name: &str) -> Result<Arc<dyn ForecastModel>, PipelineError> {
        if name.trim().is_empty() {
            return Err(PipelineError::MissingModel);
        }
        self.registry.get(name)
    }

    pub fn prepare(
        &self,
        model_name: &str,
        transform_tag: Option<&str>,
        series: &TimeSeries,
    ) -> Result<PreparedInput, PipelineError> {
        let model = self.model(model_name)?;
        let mut warnings = Vec::new();

        let window = series.trailing_window(model.input_window())?;
        debug!(
            "Model '{}' window: {} of {} observations",
            model_name,
            window.len(),
            series.len()
        );

        let scaled = match &self.scaler {
            Some(scaler) => match scaler.transform(window) {
                Ok(scaled) => scaled,
                Err(e) => {
                    warn!("Scaler transform failed (skipping scaling): {}", e);
                    warnings.push(PipelineWarning::ScalingSkipped {
                        reason: e.to_string(),
                    });
                    window.to_vec()
                }
            },
            None => window.to_vec(),
        };

        let resolved = Transform::from_tag(transform_tag);
        if let Some(tag) = resolved.unrecognized {
            warn!("Unknown transform '{}', proceeding without transform", tag);
            warnings.push(PipelineWarning::UnknownTransform { tag });
        }
        let window = resolved.transform.apply(&scaled);

        Ok(PreparedInput {
            model,
            window,
            transform: resolved.transform,
            warnings,
        })
    }

    /// Single-step prediction, inverse scaled when a scaler is loaded.
    pub fn predict(
        &self,
        model_name: &str,
        transform_tag: Option<&str>,
        series: &TimeSeries,
    ) -> Result<Prediction, PipelineError> {
        let PreparedInput {
            model,
            window,
            mut warnings,
            ..
        } = self.prepare(model_name, transform_tag, series)?;

        let raw = run_step(model.as_ref(), &window)?;
        let value = match &self.scaler {
            Some(scaler) => match scaler.inverse_transform(&[raw]) {
                Ok(inverted) => inverted.first().copied().unwrap_or(raw),
                Err(e) => {
                    warn!("Inverse transform failed: {}", e);
                    warnings.push(PipelineWarning::InverseScalingSkipped {
                        reason: e.to_string(),
                    });
                    raw
                }
            },
            None => raw,
        };

        Ok(Prediction { value, warnings })
    }

    /// Multi-step forecast by feeding each prediction back as the newest observation.
    ///
    /// Predictions stay in the scaled domain inside the loop and are inverse
    /// scaled once, as a batch, after it.
    pub fn forecast(
        &self,
        model_name: &str,
        transform_tag: Option<&str>,
        series: &TimeSeries,
        horizon: usize,
    ) -> Result<Forecast, PipelineError> {
        let PreparedInput {
            model,
            mut window,
            mut warnings,
            ..
        } = self.prepare(model_name, transform_tag, series)?;

        let mut predictions = Vec::with_capacity(horizon);
        for step in 0..horizon {
            let value = run_step(model.as_ref(), &window)?;
            debug!("Forecast step {}: {}", step + 1, value);
            predictions.push(value);
            slide(&mut window, value);
        }

        let forecast = match &self.scaler {
            Some(scaler) if !predictions.is_empty() => {
                match scaler.inverse_transform(&predictions) {
                    Ok(inverted) => inverted,
                    Err(e) => {
                        warn!("Inverse transform on predictions failed: {}", e);
                        warnings.push(PipelineWarning::InverseScalingSkipped {
                            reason: e.to_string(),
                        });
                        predictions.clone()
                    }
                }
            }
            _ => predictions.clone(),
        };

        let start = window.len().saturating_sub(predictions.len());
        let baseline = window[start..].to_vec();

        Ok(Forecast {
            forecast,
            baseline,
            warnings,
        })
    }
}

/// Drop the oldest value and append the newest.
fn slide(window: &mut Vec<f64>, newest: f64) {
    if !window.is_empty() {
        window.remove(0);
    }
    window.push(newest);
}

/// `(1, timesteps, 1)` tensor for one window
pub fn window_tensor(window: &[f64]) -> Array3<f32> {
    Array3::from_shape_fn((1, window.len(), 1), |(_, t, _)| window[t] as f32)
}

/// `(rows, timesteps, 1)` tensor for a batch of equal-length windows
pub fn batch_tensor(rows: &[Vec<f64>]) -> Array3<f32> {
    let steps = rows.first().map(Vec::len).unwrap_or(0);
    Array3::from_shape_fn((rows.len(), steps, 1), |(b, t, _)| rows[b][t] as f32)
}

fn run_step(model: &dyn ForecastModel, window: &[f64]) -> Result<f64, PipelineError> {
    let tensor = window_tensor(window);
    let output = model
        .predict(tensor.view())
        .map_err(PipelineError::Inference)?;
    output
        .first()
        .map(|&v| v as f64)
        .ok_or_else(|| {
            PipelineError::Inference(ModelError::Shape {
                reason: "model returned no values".to_string(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{FailingModel, LinearModel, StepModel};

    fn pipeline_with(model: Arc<dyn ForecastModel>, scaler: Option<Scaler>) -> InferencePipeline {
        let name = model.name().to_string();
        let registry = ModelRegistry::new().with_model(name, model);
        InferencePipeline::new(Arc::new(registry), scaler)
    }

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::new(values.to_vec())
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len(), "{:?} vs {:?}", a, b);
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_predict_uses_trailing_window() {
        let model = Arc::new(StepModel::new("lstm", Some(3), 1.0));
        let pipeline = pipeline_with(model.clone(), None);

        let prediction = pipeline
            .predict("lstm", None, &series(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();

        assert_close(&[prediction.value], &[6.0]);
        assert_eq!(model.seen_inputs(), vec![vec![3.0, 4.0, 5.0]]);
        assert!(prediction.warnings.is_empty());
    }

    #[test]
    fn test_predict_rejects_short_series() {
        let pipeline = pipeline_with(Arc::new(StepModel::new("lstm", Some(4), 1.0)), None);
        let err = pipeline.predict("lstm", None, &series(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData {
                required: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_unknown_model_and_missing_name() {
        let pipeline = pipeline_with(Arc::new(StepModel::new("lstm", None, 1.0)), None);
        assert!(matches!(
            pipeline.predict("gru", None, &series(&[1.0])),
            Err(PipelineError::ModelNotFound(_))
        ));
        assert!(matches!(
            pipeline.predict("", None, &series(&[1.0])),
            Err(PipelineError::MissingModel)
        ));
    }

    #[test]
    fn test_scaling_then_transform_then_inverse() {
        let model = Arc::new(StepModel::new("lstm", Some(4), 0.0));
        let scaler = Scaler::MinMax {
            data_min: vec![0.0],
            data_max: vec![10.0],
            feature_range: [0.0, 1.0],
        };
        let pipeline = pipeline_with(model.clone(), Some(scaler));

        let prediction = pipeline
            .predict("lstm", Some("cs"), &series(&[2.0, 4.0, 6.0, 8.0]))
            .unwrap();

        // scaled [0.2, 0.4, 0.6, 0.8] -> cs [0.2, 0.6, 0, 0]
        let seen: Vec<f64> = model.seen_inputs()[0].iter().map(|&v| v as f64).collect();
        assert_close(&seen, &[0.2, 0.6, 0.0, 0.0]);
        // last value 0.0 inverse scaled back to the data domain
        assert_close(&[prediction.value], &[0.0]);
    }

    #[test]
    fn test_scaler_failure_is_non_fatal() {
        let model = Arc::new(StepModel::new("lstm", None, 1.0));
        let scaler = Scaler::Standard {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        };
        let pipeline = pipeline_with(model.clone(), Some(scaler));

        let prediction = pipeline.predict("lstm", None, &series(&[5.0, 7.0])).unwrap();

        assert_close(&[prediction.value], &[8.0]);
        let kinds: Vec<_> = prediction.warnings.iter().map(|w| w.kind()).collect();
        assert_eq!(kinds, vec!["scaling_skipped", "inverse_scaling_skipped"]);
    }

    #[test]
    fn test_unknown_transform_matches_no_transform() {
        let weights = vec![0.5, -1.0, 2.0, 0.25];
        let pipeline = pipeline_with(Arc::new(LinearModel::new("lstm", weights, 0.1)), None);
        let input = series(&[3.0, 1.0, 4.0, 1.0, 5.0]);

        let plain = pipeline.predict("lstm", None, &input).unwrap();
        let unknown = pipeline.predict("lstm", Some("xyz"), &input).unwrap();

        assert_eq!(plain.value, unknown.value);
        assert_eq!(
            unknown.warnings,
            vec![PipelineWarning::UnknownTransform {
                tag: "xyz".to_string()
            }]
        );
    }

    #[test]
    fn test_inference_failure_is_surfaced() {
        let pipeline = pipeline_with(Arc::new(FailingModel::new("lstm", None)), None);
        let err = pipeline.predict("lstm", None, &series(&[1.0])).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
        assert!(err.to_string().starts_with("Model prediction failed"));
    }

    #[test]
    fn test_forecast_feeds_predictions_back() {
        let model = Arc::new(StepModel::new("lstm", Some(3), 1.0));
        let pipeline = pipeline_with(model.clone(), None);

        let forecast = pipeline
            .forecast("lstm", None, &series(&[0.0, 1.0, 2.0, 3.0]), 4)
            .unwrap();

        assert_close(&forecast.forecast, &[4.0, 5.0, 6.0, 7.0]);
        // final window is [5, 6, 7]; baseline can be no longer than the window
        assert_close(&forecast.baseline, &[5.0, 6.0, 7.0]);
        assert_eq!(model.seen_inputs()[1], vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_forecast_baseline_is_trailing_horizon() {
        let pipeline = pipeline_with(Arc::new(StepModel::new("lstm", Some(5), 1.0)), None);
        let forecast = pipeline
            .forecast("lstm", None, &series(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2)
            .unwrap();
        assert_close(&forecast.forecast, &[6.0, 7.0]);
        assert_close(&forecast.baseline, &[6.0, 7.0]);
    }

    #[test]
    fn test_forecast_horizon_zero_is_empty() {
        let model = Arc::new(StepModel::new("lstm", Some(2), 1.0));
        let pipeline = pipeline_with(model.clone(), None);
        let forecast = pipeline
            .forecast("lstm", None, &series(&[1.0, 2.0]), 0)
            .unwrap();
        assert!(forecast.forecast.is_empty());
        assert!(forecast.baseline.is_empty());
        assert!(model.seen_inputs().is_empty());
    }

    #[test]
    fn test_forecast_inverts_once_after_the_loop() {
        let scaler = Scaler::Standard {
            mean: vec![100.0],
            scale: vec![10.0],
        };
        let pipeline = pipeline_with(Arc::new(StepModel::new("lstm", Some(2), 0.5)), Some(scaler));

        let forecast = pipeline
            .forecast("lstm", None, &series(&[100.0, 110.0]), 2)
            .unwrap();

        // scaled window [0, 1] -> 1.5, 2.0 in the scaled domain
        assert_close(&forecast.forecast, &[115.0, 120.0]);
        assert_close(&forecast.baseline, &[1.5, 2.0]);
    }

    #[test]
    fn test_tensor_shapes() {
        assert_eq!(window_tensor(&[1.0, 2.0, 3.0]).dim(), (1, 3, 1));
        let batch = batch_tensor(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(batch.dim(), (2, 2, 1));
        assert_eq!(batch[[1, 0, 0]], 3.0);
    }
}
