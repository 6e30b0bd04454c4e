use crate::domain::errors::ModelError;
use crate::domain::ports::ForecastModel;
use ndarray::{ArrayView3, Axis};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Forecasting model backed by an ONNX Runtime session.
///
/// Input layout is `(batch, timesteps, features)`. The window length is taken
/// from the graph's declared time dimension when it is concrete.
pub struct OnnxModel {
    name: String,
    session: Mutex<Session>,
    input_window: Option<usize>,
    // Graph declares batch == 1, so batches are fed row by row
    single_row_batch: bool,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("name", &self.name)
            .field("input_window", &self.input_window)
            .finish()
    }
}

impl OnnxModel {
    /// Load a model; `window_override` is used when the graph does not pin the time dimension.
    pub fn load(
        name: impl Into<String>,
        path: &Path,
        window_override: Option<usize>,
    ) -> Result<Self, ModelError> {
        let load_error = |reason: String| ModelError::Load {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(load_error("file not found".to_string()));
        }

        let session = Session::builder()
            .map_err(|e| load_error(format!("session builder: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| load_error(e.to_string()))?;

        let dims = declared_input_dims(&session);
        let input_window = window_from_dims(&dims).or(window_override);
        let single_row_batch = dims.first() == Some(&1);

        let name = name.into();
        info!(
            "Loaded ONNX model '{}' from {:?} (input dims {:?}, window {:?})",
            name, path, dims, input_window
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_window,
            single_row_batch,
        })
    }

    fn run(&self, input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError> {
        let (batch, steps, features) = input.dim();
        let flat_data: Vec<f32> = input.iter().copied().collect();
        let shape = vec![batch, steps, features];

        let input_value = ort::value::Value::from_array((shape.as_slice(), flat_data))
            .map_err(|e| ModelError::Shape {
                reason: format!("input value creation failed: {}", e),
            })?;

        let mut session = self.session.lock().map_err(|e| ModelError::Inference {
            reason: format!("session lock poisoned: {}", e),
        })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| ModelError::Inference {
                reason: e.to_string(),
            })?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| ModelError::Inference {
                reason: "model produced no outputs".to_string(),
            })?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference {
                reason: format!("model output is not numeric: {}", e),
            })?;

        first_per_row(data, batch)
    }
}

impl ForecastModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_window(&self) -> Option<usize> {
        self.input_window
    }

    fn predict(&self, input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError> {
        let batch = input.len_of(Axis(0));
        if batch <= 1 || !self.single_row_batch {
            return self.run(input);
        }

        debug!("Model '{}' has a fixed batch of 1, running {} rows", self.name, batch);
        let mut values = Vec::with_capacity(batch);
        for row in input.axis_chunks_iter(Axis(0), 1) {
            values.extend(self.run(row)?);
        }
        Ok(values)
    }
}

fn declared_input_dims(session: &Session) -> Vec<i64> {
    session
        .inputs
        .first()
        .and_then(|input| input.input_type.tensor_shape())
        .map(|shape| shape.iter().copied().collect())
        .unwrap_or_default()
}

/// Window length from `(batch, timesteps, features)`; symbolic dims are negative.
fn window_from_dims(dims: &[i64]) -> Option<usize> {
    if dims.len() < 3 {
        return None;
    }
    usize::try_from(dims[1]).ok().filter(|&w| w > 0)
}

/// Keep the first output value of each batch row.
fn first_per_row(data: &[f32], batch: usize) -> Result<Vec<f32>, ModelError> {
    if batch == 0 {
        return Ok(Vec::new());
    }
    if data.is_empty() || data.len() % batch != 0 {
        return Err(ModelError::Shape {
            reason: format!("{} output values for a batch of {}", data.len(), batch),
        });
    }
    let per_row = data.len() / batch;
    Ok(data.iter().step_by(per_row).copied().collect())
}
